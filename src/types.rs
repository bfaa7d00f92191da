use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `CrawledPage` struct represents a single fetched page with its
/// extracted text, metadata, and outgoing links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    /// The normalized URL the page was fetched from.
    pub url: String,
    /// The page title, empty if none was found.
    pub title: String,
    /// The meta description, empty if none was found.
    pub meta_description: String,
    /// All headings (h1 through h6) in document order.
    pub headings: Vec<String>,
    /// The cleaned visible text of the page.
    pub content: String,
    /// Absolute, normalized URLs linked from the page.
    pub links: Vec<String>,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

/// The `SiteDocument` struct aggregates the pages collected from one site
/// into the single document handed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDocument {
    /// The URL the crawl started from.
    pub seed_url: String,
    /// The pages collected during the crawl.
    pub pages: Vec<CrawledPage>,
}

impl SiteDocument {
    /// Renders all pages into one text document, each page introduced by a
    /// `=== PAGE: url ===` marker followed by its title, description,
    /// headings, and content.
    ///
    /// # Returns
    ///
    /// The combined text fed to the extraction prompt.
    pub fn combined_text(&self) -> String {
        let mut combined = String::new();
        for page in &self.pages {
            combined.push_str(&format!("\n\n=== PAGE: {} ===\n", page.url));
            combined.push_str(&format!("TITLE: {}\n", page.title));
            if !page.meta_description.is_empty() {
                combined.push_str(&format!("DESCRIPTION: {}\n", page.meta_description));
            }
            if !page.headings.is_empty() {
                combined.push_str(&format!("HEADINGS: {}\n", page.headings.join(" | ")));
            }
            combined.push_str(&format!("CONTENT: {}\n", page.content));
        }
        combined
    }

    /// Builds the crawl summary statistics for these pages.
    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            total_pages: self.pages.len(),
            pages_with_content: self
                .pages
                .iter()
                .filter(|p| !p.content.trim().is_empty())
                .count(),
            total_content_length: self.pages.iter().map(|p| p.content.len()).sum(),
            pages: self
                .pages
                .iter()
                .map(|p| PageStats {
                    url: p.url.clone(),
                    title: truncate(&p.title, 100),
                    content_length: p.content.len(),
                    headings_count: p.headings.len(),
                    links_count: p.links.len(),
                })
                .collect(),
        }
    }
}

/// Truncates `text` to at most `limit` characters, appending an ellipsis when
/// something was cut.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{}...", cut)
    }
}

/// The `CrawlSummary` struct carries the statistics of a finished crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub total_pages: usize,
    pub pages_with_content: usize,
    pub total_content_length: usize,
    pub pages: Vec<PageStats>,
}

/// Per-page statistics inside a `CrawlSummary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStats {
    pub url: String,
    pub title: String,
    pub content_length: usize,
    pub headings_count: usize,
    pub links_count: usize,
}

/// The `CompanyProfile` struct is the structured result the LLM extracts
/// from a site document: the company record plus its services and products.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_info: CompanyInfo,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub products: Vec<Product>,
    /// Sector validation results attached after extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

/// The company-level fields of a profile. Every field is optional: the model
/// answers `null` for anything the website does not state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub logo: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub company_type: Option<String>,
    pub service_or_product: Option<String>,
    pub video_url: Option<String>,
    pub headquarter: Option<String>,
    pub city: Option<String>,
    pub employee_count: Option<String>,
    pub founded_year: Option<String>,
    pub business_model: Option<String>,
    pub women_founded: Option<String>,
    pub industry: Option<String>,
    pub sub_industry: Option<String>,
    pub solution_area: Option<String>,
    pub tags: Option<String>,
    pub active_customers: Option<String>,
    pub available_countries: Option<String>,
}

/// A single service offered by the company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A single product offered by the company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    pub logo: Option<String>,
    pub name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub video: Option<String>,
    pub employee_count: Option<String>,
    pub founded_year: Option<String>,
    pub business_model: Option<String>,
    pub industry: Option<String>,
    pub sub_industry: Option<String>,
    pub solution_area: Option<String>,
    pub screenshots: Option<String>,
    pub how_it_works: Option<String>,
    pub value_proposition: Option<String>,
    pub use_case_title: Option<String>,
    pub use_case_description: Option<String>,
    pub case_study_title: Option<String>,
    pub customer_name: Option<String>,
    pub case_study_description: Option<String>,
    pub statistics_title: Option<String>,
    pub statistics_value: Option<String>,
    pub active_customers: Option<String>,
    pub customer_logos: Option<String>,
    pub available_countries: Option<String>,
    pub integrations: Option<String>,
    pub partnerships: Option<String>,
}

/// The `ValidationReport` struct records what the sector validation pass did
/// to a profile: corrections applied, issues it could not resolve, and
/// whether every sector field ended up in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub corrections: Vec<String>,
    pub issues: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            valid: true,
            corrections: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// The `ProcessingOutcome` struct is the record of one pipeline run over one
/// site, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub success: bool,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock processing time in seconds.
    pub processing_time: f64,
    pub pages_crawled: usize,
    pub company: Option<CompanyProfile>,
    pub error: Option<String>,
    pub crawl_summary: Option<CrawlSummary>,
}

impl ProcessingOutcome {
    /// Creates a failed outcome for `url` with the given error message.
    pub fn failed(url: &str, error: String, processing_time: f64) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            timestamp: Utc::now(),
            processing_time,
            pages_crawled: 0,
            company: None,
            error: Some(error),
            crawl_summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, content: &str) -> CrawledPage {
        CrawledPage {
            url: url.to_string(),
            title: "Acme".to_string(),
            meta_description: "Widgets".to_string(),
            headings: vec!["About".to_string()],
            content: content.to_string(),
            links: vec![],
            fetched_at: Utc::now(),
        }
    }

    /// Tests that the combined document carries the page markers and fields.
    #[test]
    fn test_combined_text() {
        let doc = SiteDocument {
            seed_url: "https://acme.test".to_string(),
            pages: vec![page("https://acme.test/about", "We make widgets.")],
        };

        let text = doc.combined_text();
        assert!(text.contains("=== PAGE: https://acme.test/about ==="));
        assert!(text.contains("TITLE: Acme"));
        assert!(text.contains("DESCRIPTION: Widgets"));
        assert!(text.contains("HEADINGS: About"));
        assert!(text.contains("CONTENT: We make widgets."));
    }

    /// Tests the summary statistics over mixed pages.
    #[test]
    fn test_summary_counts() {
        let doc = SiteDocument {
            seed_url: "https://acme.test".to_string(),
            pages: vec![
                page("https://acme.test", "We make widgets."),
                page("https://acme.test/blank", "   "),
            ],
        };

        let summary = doc.summary();
        assert_eq!(summary.total_pages, 2);
        assert_eq!(summary.pages_with_content, 1);
        assert_eq!(summary.pages.len(), 2);
        assert_eq!(summary.pages[0].headings_count, 1);
    }

    /// Tests that unknown JSON fields and missing sections deserialize
    /// into an empty-but-valid profile.
    #[test]
    fn test_profile_lenient_deserialization() {
        let json = r#"{
            "company_info": {"name": "Acme", "industry": "Software", "unknown_field": 1},
            "services": [{"name": "Consulting", "description": null}]
        }"#;

        let profile: CompanyProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.company_info.name.as_deref(), Some("Acme"));
        assert_eq!(profile.services.len(), 1);
        assert!(profile.products.is_empty());
    }
}
