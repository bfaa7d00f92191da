use crate::crawler::SiteCrawler;
use crate::llm::LlmClient;
use crate::prompt::PromptBuilder;
use crate::sectors::SectorCatalog;
use crate::store::CompanyStore;
use crate::types::{CompanyProfile, CrawlSummary, ProcessingOutcome};
use crate::{CrawlerConfig, Result};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// The delay between sites in batch mode.
const BATCH_DELAY: Duration = Duration::from_secs(2);

/// The `ExtractionService` struct runs the whole pipeline for a site:
/// crawl, aggregate, LLM extraction, sector validation. Every run is
/// recorded as a `ProcessingOutcome` in the in-memory history and, when a
/// store is attached, in the sqlite database.
pub struct ExtractionService {
    config: CrawlerConfig,
    llm: LlmClient,
    catalog: SectorCatalog,
    store: Option<CompanyStore>,
    history: Vec<ProcessingOutcome>,
}

impl ExtractionService {
    /// Creates a new `ExtractionService` with the given configuration and
    /// sector catalog.
    pub fn new(config: CrawlerConfig, catalog: SectorCatalog) -> Self {
        let llm = LlmClient::new(config.llm.clone());
        Self {
            config,
            llm,
            catalog,
            store: None,
            history: Vec::new(),
        }
    }

    /// Attaches a sqlite store; subsequent outcomes are persisted to it.
    pub fn with_store(mut self, store: CompanyStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Processes one company website end to end.
    ///
    /// Failures at any stage are captured into a failed outcome; this method
    /// never errors so batch runs keep going.
    ///
    /// # Arguments
    ///
    /// * `url` - The company website URL to analyze.
    ///
    /// # Returns
    ///
    /// The `ProcessingOutcome` of the run, also appended to the history.
    pub async fn process_site(&mut self, url: &str) -> ProcessingOutcome {
        let start = Instant::now();
        info!("Processing company website: {}", url);

        let outcome = match self.run_pipeline(url).await {
            Ok((profile, summary)) => {
                info!(
                    "Extracted profile for {} from {} pages",
                    profile.company_info.name.as_deref().unwrap_or("unknown company"),
                    summary.total_pages
                );
                ProcessingOutcome {
                    success: true,
                    url: url.to_string(),
                    timestamp: Utc::now(),
                    processing_time: start.elapsed().as_secs_f64(),
                    pages_crawled: summary.total_pages,
                    company: Some(profile),
                    error: None,
                    crawl_summary: Some(summary),
                }
            }
            Err(e) => {
                error!("Error processing {}: {}", url, e);
                ProcessingOutcome::failed(url, e.to_string(), start.elapsed().as_secs_f64())
            }
        };

        self.record(outcome.clone()).await;
        outcome
    }

    /// The fallible pipeline body: crawl, prompt, extract, validate.
    async fn run_pipeline(&self, url: &str) -> Result<(CompanyProfile, CrawlSummary)> {
        let crawler = SiteCrawler::new(self.config.clone())?;
        let document = crawler.crawl(url).await?;
        let summary = document.summary();

        info!(
            "Crawled {} pages, {} characters of content",
            summary.total_pages, summary.total_content_length
        );

        let builder = PromptBuilder::new(&document).with_catalog(&self.catalog);
        let mut profile = self
            .llm
            .extract_profile(&builder.system_prompt(), &builder.build())
            .await?;

        let report = self.catalog.validate_profile(&mut profile);
        profile.validation = Some(report);

        Ok((profile, summary))
    }

    /// Processes several websites sequentially with a politeness delay
    /// between them. A failing site never aborts the batch.
    ///
    /// # Arguments
    ///
    /// * `urls` - The website URLs to process.
    ///
    /// # Returns
    ///
    /// One `ProcessingOutcome` per input URL, in order.
    pub async fn process_batch(&mut self, urls: &[String]) -> Vec<ProcessingOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());

        for (i, url) in urls.iter().enumerate() {
            info!("Processing website {}/{}: {}", i + 1, urls.len(), url);
            outcomes.push(self.process_site(url).await);

            if i + 1 < urls.len() {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }

        info!("Batch processing completed: {} websites", outcomes.len());
        outcomes
    }

    /// Appends an outcome to the capped history and persists it when a
    /// store is attached. Storage failures are logged, never fatal.
    async fn record(&mut self, outcome: ProcessingOutcome) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_outcome(&outcome).await {
                error!("Failed to save outcome for {}: {}", outcome.url, e);
            }
        }

        self.history.push(outcome);
        if self.history.len() > crate::HISTORY_LIMIT {
            let excess = self.history.len() - crate::HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// The outcomes recorded by this service instance, oldest first.
    pub fn history(&self) -> &[ProcessingOutcome] {
        &self.history
    }

    /// The most recent outcome, if any.
    pub fn latest(&self) -> Option<&ProcessingOutcome> {
        self.history.last()
    }

    /// Clears the in-memory history.
    pub fn clear_history(&mut self) {
        self.history.clear();
        info!("Processing history cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sectors::SectorCatalog;

    fn service() -> ExtractionService {
        let catalog = SectorCatalog::from_csv_str(
            "Id;Industry;C;Sub-Industry;C;Solution Area\n1;Finance;;Payments;;Fraud Detection\n",
        )
        .unwrap();
        ExtractionService::new(CrawlerConfig::default(), catalog)
    }

    /// Tests that an invalid URL produces a failed outcome, not an error.
    #[tokio::test]
    async fn test_invalid_url_outcome() {
        let mut service = service();
        let outcome = service.process_site("not-a-url").await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.pages_crawled, 0);
        assert_eq!(service.history().len(), 1);
    }

    /// Tests history recording and clearing.
    #[tokio::test]
    async fn test_history() {
        let mut service = service();
        service.process_site("ftp://nope").await;
        service.process_site("also wrong").await;

        assert_eq!(service.history().len(), 2);
        assert_eq!(service.latest().unwrap().url, "also wrong");

        service.clear_history();
        assert!(service.history().is_empty());
    }
}
