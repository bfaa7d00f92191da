use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The `CrawlerConfig` struct holds the configuration settings for the whole
/// pipeline: crawling limits, HTTP behaviour, the sector catalog location,
/// the sqlite database path, and the LLM endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// The maximum number of pages crawled per domain.
    pub max_pages: usize,
    /// The number of concurrent page fetches within a crawl wave.
    pub concurrent_requests: usize,
    /// The timeout duration for HTTP requests.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// The delay between consecutive page requests.
    #[serde(with = "duration_secs")]
    pub crawl_delay: Duration,
    /// The maximum number of retries for failed requests.
    pub max_retries: u32,
    /// The cap on extracted text per page, in characters.
    pub max_content_length: usize,
    /// The user agent string to be used in HTTP requests.
    pub user_agent: String,
    /// Path to the semicolon-delimited sector catalog CSV.
    pub sectors_path: String,
    /// Path to the sqlite database file.
    pub database_path: String,
    /// The configuration settings for the LLM endpoint.
    pub llm: LlmConfig,
}

/// The `LlmConfig` struct holds the settings for the OpenAI-compatible chat
/// completions endpoint used for profile extraction.
///
/// The API key is read from the `SITESCOUT_LLM__API_KEY` (or plain
/// `OPENAI_API_KEY`) environment variable and is never written back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// The base URL of the chat completions API, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    /// The API key sent as a bearer token. Empty means unauthenticated (local models).
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// The model used for extraction.
    pub model: String,
    /// The temperature setting, controlling the randomness of the output.
    pub temperature: f32,
    /// The maximum number of tokens allowed in the LLM response.
    pub max_tokens: u32,
}

impl Default for CrawlerConfig {
    /// Provides default values for the `CrawlerConfig` struct.
    fn default() -> Self {
        Self {
            max_pages: crate::DEFAULT_MAX_PAGES,
            concurrent_requests: crate::DEFAULT_CONCURRENT_REQUESTS,
            timeout: crate::DEFAULT_TIMEOUT,
            crawl_delay: crate::DEFAULT_CRAWL_DELAY,
            max_retries: crate::DEFAULT_MAX_RETRIES,
            max_content_length: crate::DEFAULT_MAX_CONTENT_LENGTH,
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            ),
            sectors_path: String::from("sectors.csv"),
            database_path: String::from("sitescout.db"),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("https://api.openai.com/v1"),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: String::from("gpt-4o"),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

impl CrawlerConfig {
    /// Loads the configuration from layered sources: built-in defaults, an
    /// optional `sitescout.toml` in the working directory, then `SITESCOUT_*`
    /// environment variables (`SITESCOUT_MAX_PAGES=20`,
    /// `SITESCOUT_LLM__MODEL=gpt-4o-mini`, ...).
    ///
    /// # Returns
    ///
    /// A `Result` containing the merged `CrawlerConfig`, or an error if a
    /// source fails to parse.
    pub fn load() -> crate::Result<Self> {
        let defaults = Self::default();

        let merged = Config::builder()
            .add_source(Config::try_from(&defaults)?)
            .add_source(File::new("sitescout", FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("SITESCOUT").separator("__"))
            .build()?;

        let mut cfg: CrawlerConfig = merged.try_deserialize()?;

        // try_from(&defaults) drops the key through skip_serializing, so it
        // has to be restored unless an override supplied one.
        if cfg.llm.api_key.is_empty() {
            cfg.llm.api_key = defaults.llm.api_key;
        }

        Ok(cfg)
    }
}

/// Serde helper storing `Duration` fields as whole seconds, so the TOML file
/// and environment overrides can say `timeout = 30`.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that the defaults mirror the documented crawl limits.
    #[test]
    fn test_default_config() {
        let config = CrawlerConfig::default();

        assert_eq!(config.max_pages, 10);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.crawl_delay, Duration::from_secs(1));
        assert_eq!(config.max_content_length, 50_000);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    /// Tests the duration round trip through the seconds representation.
    #[test]
    fn test_duration_serde_round_trip() {
        let config = CrawlerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: CrawlerConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.timeout, config.timeout);
        assert_eq!(back.crawl_delay, config.crawl_delay);
    }

    /// Tests that the API key never survives serialization.
    #[test]
    fn test_api_key_not_serialized() {
        let mut config = CrawlerConfig::default();
        config.llm.api_key = "sk-secret".to_string();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
