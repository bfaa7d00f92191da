use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod crawler;
pub mod export;
pub mod llm;
pub mod prompt;
pub mod scraper;
pub mod sectors;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::CrawlerConfig;
pub use types::{CompanyProfile, CrawledPage, ProcessingOutcome, SiteDocument};

/// The `CrawlerError` enum represents the errors that can occur while crawling
/// a site and extracting a company profile from it.
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Represents a seed or discovered URL that cannot be crawled.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Represents an error that occurs during content extraction.
    #[error("Content extraction failed: {0}")]
    ExtractionError(String),
    /// Represents an error that occurs during LLM processing.
    #[error("LLM processing failed: {0}")]
    LlmError(String),
    /// Represents a malformed or incomplete LLM response.
    #[error("Invalid profile response: {0}")]
    ProfileError(String),
    /// Represents an error while loading the sector catalog.
    #[error("Sector catalog error: {0}")]
    CatalogError(String),
    /// Represents an error raised by the configuration layer.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
    /// Represents an error raised by the sqlite store.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    /// Represents an error while writing export files.
    #[error("Export failed: {0}")]
    ExportError(#[from] std::io::Error),
}

/// A type alias for `Result` with the `CrawlerError` error type.
pub type Result<T> = std::result::Result<T, CrawlerError>;

// Constants

/// The default timeout duration for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// The default number of concurrent page fetches within a crawl wave.
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 5;
/// The default maximum number of retries for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// The default maximum number of pages crawled per domain.
pub const DEFAULT_MAX_PAGES: usize = 10;
/// The default delay between page requests.
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(1);
/// The default cap on extracted text per page, in characters.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 50_000;
/// The number of processing outcomes kept in the in-memory history.
pub const HISTORY_LIMIT: usize = 100;
