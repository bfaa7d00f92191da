use crate::scraper::{normalize_url, ContentScraper};
use crate::{CrawledPage, CrawlerConfig, CrawlerError, Result, SiteDocument};
use futures::{stream, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// Path prefixes unlikely to describe the company itself.
const SKIP_PATTERNS: &[&str] = &[
    "/blog", "/news", "/press", "/careers", "/jobs", "/support", "/help", "/faq", "/privacy",
    "/terms", "/legal", "/sitemap", "/search", "/login", "/register", "/account",
];

/// File extensions that are never HTML worth fetching.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".zip", ".mp4",
];

/// Path prefixes that usually carry company information.
const PRIORITY_PATTERNS: &[&str] = &[
    "/about", "/company", "/team", "/contact", "/products", "/services", "/solutions",
    "/customers", "/case-studies", "/portfolio",
];

/// The `SiteCrawler` struct walks a company website breadth-first, staying on
/// the seed domain, and collects the extracted pages into a `SiteDocument`.
/// It uses the `reqwest` library for HTTP requests and `ContentScraper` for
/// per-page extraction.
pub struct SiteCrawler {
    /// The HTTP client used for making requests.
    client: Client,
    /// The configuration settings for the crawl.
    config: CrawlerConfig,
    /// The per-page content extractor.
    scraper: ContentScraper,
    /// The rate limiter used to control the rate of requests.
    rate_limiter: Arc<Semaphore>,
    /// The progress bar used to display progress information.
    progress: MultiProgress,
}

impl SiteCrawler {
    /// Creates a new `SiteCrawler` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration settings for the crawl.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SiteCrawler` instance, or an error if the
    /// HTTP client could not be created.
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(CrawlerError::RequestError)?;

        let rate_limiter = Arc::new(Semaphore::new(config.concurrent_requests));
        let scraper = ContentScraper::new(config.max_content_length);

        Ok(Self {
            client,
            config,
            scraper,
            rate_limiter,
            progress: MultiProgress::new(),
        })
    }

    /// Crawls the site starting from `seed`, breadth-first, up to the
    /// configured page limit. Pages that fail to fetch are logged and
    /// skipped.
    ///
    /// # Arguments
    ///
    /// * `seed` - The URL the crawl starts from. Must be http(s) with a host.
    ///
    /// # Returns
    ///
    /// A `Result` containing the aggregated `SiteDocument`, or an error if
    /// the seed URL is invalid or no page yielded any content.
    pub async fn crawl(&self, seed: &str) -> Result<SiteDocument> {
        let seed_url = parse_seed(seed)?;
        let host = seed_url
            .host_str()
            .ok_or_else(|| CrawlerError::InvalidUrl(seed.to_string()))?
            .to_lowercase();

        let pb = self.progress.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(format!("Crawling {}...", host));

        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier = vec![normalize_url(&seed_url)];
        let mut pages: Vec<CrawledPage> = Vec::new();

        while !frontier.is_empty() && visited.len() < self.config.max_pages {
            let budget = self.config.max_pages - visited.len();
            frontier.retain(|url| !visited.contains(url));
            let rest = frontier.split_off(frontier.len().min(budget));
            let wave = std::mem::replace(&mut frontier, rest);

            if wave.is_empty() {
                break;
            }
            for url in &wave {
                visited.insert(url.clone());
            }

            let fetched = stream::iter(wave)
                .map(|url| {
                    let pb = pb.clone();
                    async move {
                        pb.set_message(format!("Fetching {}", url));
                        self.fetch_page(url).await
                    }
                })
                .buffer_unordered(self.config.concurrent_requests)
                .collect::<Vec<_>>()
                .await;

            for page in fetched.into_iter().flatten() {
                for link in &page.links {
                    if !visited.contains(link)
                        && !frontier.contains(link)
                        && self.is_relevant_page(link, &host)
                    {
                        frontier.push(link.clone());
                    }
                }
                pages.push(page);
            }
        }

        pb.finish_with_message(format!(
            "Crawled {} of {} visited pages on {}",
            pages.len(),
            visited.len(),
            host
        ));

        let document = SiteDocument {
            seed_url: normalize_url(&seed_url),
            pages,
        };

        if document.summary().pages_with_content == 0 {
            return Err(CrawlerError::ExtractionError(format!(
                "no content was collected from {}",
                seed
            )));
        }

        Ok(document)
    }

    /// Fetches and extracts a single page with retries. Returns `None` when
    /// every attempt failed; the crawl continues without the page.
    async fn fetch_page(&self, url: String) -> Option<CrawledPage> {
        let _permit = self.rate_limiter.acquire().await.expect("Rate limiter closed");
        sleep(self.config.crawl_delay).await;

        let mut retries = 0;
        loop {
            match self.try_fetch_page(&url).await {
                Ok(page) => return Some(page),
                Err(e) => {
                    retries += 1;
                    if retries >= self.config.max_retries {
                        warn!("Giving up on {} after {} attempts: {}", url, retries, e);
                        return None;
                    }
                    let delay = Duration::from_secs(2u64.pow(retries));
                    debug!("Retrying {} in {:?}: {}", url, delay, e);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Attempts to fetch and extract a single page.
    async fn try_fetch_page(&self, url: &str) -> Result<CrawledPage> {
        debug!("Fetching content from: {}", url);

        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::ExtractionError(format!(
                "{} returned status {}",
                url, status
            )));
        }

        let html = response.text().await?;
        self.scraper.extract(&html, url)
    }

    /// Checks whether a discovered URL is worth crawling: same host as the
    /// seed, not a skip path or binary file, and either the site root or a
    /// company-relevant section.
    fn is_relevant_page(&self, url: &str, base_host: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        let host = match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };
        if host != base_host {
            return false;
        }

        let path = parsed.path().to_lowercase();

        if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }
        if SKIP_PATTERNS.iter().any(|pattern| path.starts_with(pattern)) {
            return false;
        }

        path == "/" || path.is_empty() || PRIORITY_PATTERNS.iter().any(|p| path.starts_with(p))
    }
}

/// Parses and checks a seed URL: http(s) only, host required.
fn parse_seed(seed: &str) -> Result<Url> {
    let url = Url::parse(seed).map_err(|_| CrawlerError::InvalidUrl(seed.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(CrawlerError::InvalidUrl(seed.to_string()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawler() -> SiteCrawler {
        SiteCrawler::new(CrawlerConfig::default()).unwrap()
    }

    /// Tests the seed URL checks.
    #[test]
    fn test_parse_seed() {
        assert!(parse_seed("https://acme.test").is_ok());
        assert!(parse_seed("http://acme.test/about").is_ok());
        assert!(parse_seed("ftp://acme.test").is_err());
        assert!(parse_seed("not a url").is_err());
        assert!(parse_seed("file:///etc/passwd").is_err());
    }

    /// Tests that only same-host company pages pass the relevance filter.
    #[test]
    fn test_relevance_filter() {
        let c = crawler();

        assert!(c.is_relevant_page("https://acme.test", "acme.test"));
        assert!(c.is_relevant_page("https://acme.test/about", "acme.test"));
        assert!(c.is_relevant_page("https://acme.test/products/widget", "acme.test"));
        assert!(c.is_relevant_page("https://ACME.test/team", "acme.test"));

        // other domains never qualify
        assert!(!c.is_relevant_page("https://other.test/about", "acme.test"));
        // skip sections
        assert!(!c.is_relevant_page("https://acme.test/blog/post-1", "acme.test"));
        assert!(!c.is_relevant_page("https://acme.test/careers", "acme.test"));
        assert!(!c.is_relevant_page("https://acme.test/login", "acme.test"));
        // binary files
        assert!(!c.is_relevant_page("https://acme.test/about/deck.pdf", "acme.test"));
        // unclassified sections are not crawled
        assert!(!c.is_relevant_page("https://acme.test/random-page", "acme.test"));
    }
}
