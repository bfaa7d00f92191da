use crate::types::{CompanyProfile, ProcessingOutcome};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use tracing::debug;

/// A company row as listed or searched.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyRow {
    pub url: String,
    pub name: Option<String>,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored processing result row.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub url: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub processing_time: f64,
    pub pages_crawled: i64,
    pub error: Option<String>,
}

/// Aggregate statistics over everything stored.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatistics {
    pub total_companies: i64,
    pub total_results: i64,
    pub successful_results: i64,
    pub success_rate: f64,
    pub top_industries: Vec<(String, i64)>,
}

/// The `CompanyStore` struct persists processing results and extracted
/// company profiles in a sqlite database.
pub struct CompanyStore {
    pool: SqlitePool,
}

impl CompanyStore {
    /// Opens (creating if missing) the database at `path` and ensures the
    /// schema exists.
    pub async fn open(path: &str) -> Result<Self> {
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS companies (
                    url TEXT PRIMARY KEY,
                    name TEXT,
                    description TEXT,
                    industry TEXT,
                    sub_industry TEXT,
                    solution_area TEXT,
                    business_model TEXT,
                    headquarter TEXT,
                    founded_year TEXT,
                    profile_json TEXT NOT NULL,
                    created_at DATETIME NOT NULL
                )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS services (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_url TEXT NOT NULL,
                    name TEXT,
                    description TEXT
                )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS products (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_url TEXT NOT NULL,
                    name TEXT,
                    description TEXT,
                    industry TEXT
                )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS processing_results (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    url TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    timestamp DATETIME NOT NULL,
                    processing_time REAL NOT NULL,
                    pages_crawled INTEGER NOT NULL,
                    error TEXT
                )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Database schema ready");
        Ok(())
    }

    /// Saves a processing outcome: the result row always, and the company
    /// with its services and products when extraction succeeded. A company
    /// row for the same url is replaced together with its children.
    pub async fn save_outcome(&self, outcome: &ProcessingOutcome) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
                INSERT INTO processing_results
                    (url, success, timestamp, processing_time, pages_crawled, error)
                VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&outcome.url)
        .bind(outcome.success)
        .bind(outcome.timestamp)
        .bind(outcome.processing_time)
        .bind(outcome.pages_crawled as i64)
        .bind(&outcome.error)
        .execute(&mut *tx)
        .await?;

        if let Some(profile) = &outcome.company {
            let info = &profile.company_info;
            let profile_json = serde_json::to_string(profile)
                .map_err(|e| crate::CrawlerError::ProfileError(e.to_string()))?;

            sqlx::query("DELETE FROM services WHERE company_url = ?")
                .bind(&outcome.url)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM products WHERE company_url = ?")
                .bind(&outcome.url)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                    INSERT OR REPLACE INTO companies
                        (url, name, description, industry, sub_industry, solution_area,
                         business_model, headquarter, founded_year, profile_json, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&outcome.url)
            .bind(&info.name)
            .bind(&info.description)
            .bind(&info.industry)
            .bind(&info.sub_industry)
            .bind(&info.solution_area)
            .bind(&info.business_model)
            .bind(&info.headquarter)
            .bind(&info.founded_year)
            .bind(&profile_json)
            .bind(outcome.timestamp)
            .execute(&mut *tx)
            .await?;

            for service in &profile.services {
                sqlx::query(
                    "INSERT INTO services (company_url, name, description) VALUES (?, ?, ?)",
                )
                .bind(&outcome.url)
                .bind(&service.name)
                .bind(&service.description)
                .execute(&mut *tx)
                .await?;
            }

            for product in &profile.products {
                sqlx::query(
                    "INSERT INTO products (company_url, name, description, industry) VALUES (?, ?, ?, ?)",
                )
                .bind(&outcome.url)
                .bind(&product.name)
                .bind(&product.description)
                .bind(&product.industry)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Lists stored companies, most recent first.
    pub async fn list_companies(&self, limit: i64) -> Result<Vec<CompanyRow>> {
        let rows = sqlx::query(
            "SELECT url, name, industry, created_at FROM companies ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(company_row).collect()
    }

    /// Fetches one company's full profile by url.
    pub async fn get_company(&self, url: &str) -> Result<Option<CompanyProfile>> {
        let row = sqlx::query("SELECT profile_json FROM companies WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("profile_json")?;
                let profile = serde_json::from_str(&json)
                    .map_err(|e| crate::CrawlerError::ProfileError(e.to_string()))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Searches companies by name, description, or industry.
    pub async fn search_companies(&self, query: &str) -> Result<Vec<CompanyRow>> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            r#"
                SELECT url, name, industry, created_at FROM companies
                WHERE name LIKE ? OR description LIKE ? OR industry LIKE ?
                ORDER BY created_at DESC
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(company_row).collect()
    }

    /// Lists recent processing results, most recent first.
    pub async fn recent_results(&self, limit: i64) -> Result<Vec<ResultRow>> {
        let rows = sqlx::query(
            r#"
                SELECT url, success, timestamp, processing_time, pages_crawled, error
                FROM processing_results ORDER BY timestamp DESC LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ResultRow {
                    url: row.try_get("url")?,
                    success: row.try_get("success")?,
                    timestamp: row.try_get("timestamp")?,
                    processing_time: row.try_get("processing_time")?,
                    pages_crawled: row.try_get("pages_crawled")?,
                    error: row.try_get("error")?,
                })
            })
            .collect()
    }

    /// Computes aggregate statistics over stored data.
    pub async fn statistics(&self) -> Result<StoreStatistics> {
        let total_companies: i64 = sqlx::query("SELECT COUNT(*) AS n FROM companies")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let total_results: i64 = sqlx::query("SELECT COUNT(*) AS n FROM processing_results")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let successful_results: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM processing_results WHERE success = 1")
                .fetch_one(&self.pool)
                .await?
                .try_get("n")?;

        let industry_rows = sqlx::query(
            r#"
                SELECT industry, COUNT(*) AS n FROM companies
                WHERE industry IS NOT NULL
                GROUP BY industry ORDER BY n DESC LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let top_industries = industry_rows
            .iter()
            .map(|row| Ok((row.try_get("industry")?, row.try_get("n")?)))
            .collect::<Result<Vec<_>>>()?;

        let success_rate = if total_results > 0 {
            successful_results as f64 / total_results as f64
        } else {
            0.0
        };

        Ok(StoreStatistics {
            total_companies,
            total_results,
            successful_results,
            success_rate,
            top_industries,
        })
    }

    /// Deletes a company and its services and products. Returns whether a
    /// company row existed.
    pub async fn delete_company(&self, url: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM services WHERE company_url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM products WHERE company_url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM companies WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }
}

fn company_row(row: &sqlx::sqlite::SqliteRow) -> Result<CompanyRow> {
    Ok(CompanyRow {
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        industry: row.try_get("industry")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompanyInfo, Service};
    use chrono::Utc;

    fn outcome(url: &str, name: &str, industry: &str) -> ProcessingOutcome {
        let mut profile = CompanyProfile::default();
        profile.company_info = CompanyInfo {
            name: Some(name.to_string()),
            industry: Some(industry.to_string()),
            description: Some("Widgets".to_string()),
            ..Default::default()
        };
        profile.services.push(Service {
            name: Some("Consulting".to_string()),
            description: None,
        });

        ProcessingOutcome {
            success: true,
            url: url.to_string(),
            timestamp: Utc::now(),
            processing_time: 1.5,
            pages_crawled: 3,
            company: Some(profile),
            error: None,
            crawl_summary: None,
        }
    }

    async fn store() -> (CompanyStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = CompanyStore::open(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    /// Tests the save / list / fetch round trip.
    #[tokio::test]
    async fn test_save_and_fetch() {
        let (store, _dir) = store().await;
        store.save_outcome(&outcome("https://acme.test", "Acme", "Finance")).await.unwrap();

        let companies = store.list_companies(10).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name.as_deref(), Some("Acme"));

        let profile = store.get_company("https://acme.test").await.unwrap().unwrap();
        assert_eq!(profile.services.len(), 1);
    }

    /// Tests that saving the same url twice replaces the company.
    #[tokio::test]
    async fn test_replace_on_resave() {
        let (store, _dir) = store().await;
        store.save_outcome(&outcome("https://acme.test", "Acme", "Finance")).await.unwrap();
        store.save_outcome(&outcome("https://acme.test", "Acme Corp", "Finance")).await.unwrap();

        let companies = store.list_companies(10).await.unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name.as_deref(), Some("Acme Corp"));

        // children replaced, not accumulated
        let profile = store.get_company("https://acme.test").await.unwrap().unwrap();
        assert_eq!(profile.services.len(), 1);
    }

    /// Tests failed outcomes only land in processing_results.
    #[tokio::test]
    async fn test_failed_outcome() {
        let (store, _dir) = store().await;
        let failed = ProcessingOutcome::failed("https://down.test", "timeout".to_string(), 0.2);
        store.save_outcome(&failed).await.unwrap();

        assert!(store.list_companies(10).await.unwrap().is_empty());
        let results = store.recent_results(10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("timeout"));
    }

    /// Tests search and statistics.
    #[tokio::test]
    async fn test_search_and_statistics() {
        let (store, _dir) = store().await;
        store.save_outcome(&outcome("https://acme.test", "Acme", "Finance")).await.unwrap();
        store.save_outcome(&outcome("https://beta.test", "Beta", "Healthcare")).await.unwrap();
        store
            .save_outcome(&ProcessingOutcome::failed("https://down.test", "x".to_string(), 0.1))
            .await
            .unwrap();

        let hits = store.search_companies("acme").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://acme.test");

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_companies, 2);
        assert_eq!(stats.total_results, 3);
        assert_eq!(stats.successful_results, 2);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.top_industries.len(), 2);
    }

    /// Tests company deletion.
    #[tokio::test]
    async fn test_delete_company() {
        let (store, _dir) = store().await;
        store.save_outcome(&outcome("https://acme.test", "Acme", "Finance")).await.unwrap();

        assert!(store.delete_company("https://acme.test").await.unwrap());
        assert!(!store.delete_company("https://acme.test").await.unwrap());
        assert!(store.list_companies(10).await.unwrap().is_empty());
    }
}
