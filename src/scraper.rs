use crate::{CrawledPage, Result};
use scraper::{Html, Selector};
use tracing::instrument;
use url::Url;

/// The `ContentScraper` struct extracts the company-relevant parts of an HTML
/// document: visible text with navigation and boilerplate stripped, the page
/// title and meta description, all headings, and same-page links resolved to
/// absolute URLs.
pub struct ContentScraper {
    /// CSS selectors tried in order for the main text. The first selector
    /// that yields non-empty text wins, so boilerplate-heavy fallbacks only
    /// apply to pages without a recognizable content region.
    content_selectors: Vec<Selector>,
    title_selector: Selector,
    description_selector: Selector,
    heading_selector: Selector,
    link_selector: Selector,
    /// Cap on extracted text per page, in characters.
    max_content_length: usize,
}

impl Default for ContentScraper {
    /// Provides a `ContentScraper` with the default selector chain and the
    /// default per-page content cap.
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_CONTENT_LENGTH)
    }
}

impl ContentScraper {
    /// Creates a new `ContentScraper` with the given per-page content cap.
    ///
    /// # Arguments
    ///
    /// * `max_content_length` - The maximum number of characters kept per page.
    ///
    /// # Returns
    ///
    /// A new instance of `ContentScraper`.
    pub fn new(max_content_length: usize) -> Self {
        let content_patterns = [
            "main p, main li, main h2 + p",
            "article p, article li",
            "div.content p, div.content li",
            "section p, section li",
            "body p, body li",
        ];

        let content_selectors = content_patterns
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();

        Self {
            content_selectors,
            title_selector: Selector::parse("title").unwrap(),
            description_selector: Selector::parse("meta[name='description']").unwrap(),
            heading_selector: Selector::parse("h1, h2, h3, h4, h5, h6").unwrap(),
            link_selector: Selector::parse("a[href]").unwrap(),
            max_content_length,
        }
    }

    /// Extracts a `CrawledPage` from the given HTML string.
    ///
    /// # Arguments
    ///
    /// * `html` - The HTML string to be parsed.
    /// * `url` - The URL the document was fetched from, used to resolve
    ///   relative links.
    ///
    /// # Returns
    ///
    /// A `Result` containing the extracted page. Extraction itself never
    /// fails; a page without recognizable content yields an empty `content`
    /// field and is filtered out by the crawler.
    #[instrument(skip(self, html), fields(html_length = html.len()))]
    pub fn extract(&self, html: &str, url: &str) -> Result<CrawledPage> {
        let document = Html::parse_document(html);

        Ok(CrawledPage {
            url: url.to_string(),
            title: self.extract_title(&document),
            meta_description: self.extract_meta_description(&document),
            headings: self.extract_headings(&document),
            content: self.extract_content(&document),
            links: self.extract_links(&document, url),
            fetched_at: chrono::Utc::now(),
        })
    }

    /// Extracts the main text using the configured selector chain.
    fn extract_content(&self, document: &Html) -> String {
        for selector in &self.content_selectors {
            let content = document
                .select(selector)
                .map(|element| element.text().collect::<Vec<_>>().join(" "))
                .filter(|s| !s.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n");

            if !content.trim().is_empty() {
                return self.clean_text(&content);
            }
        }

        String::new()
    }

    /// Extracts the page title, preferring the `<title>` element.
    fn extract_title(&self, document: &Html) -> String {
        document
            .select(&self.title_selector)
            .next()
            .map(|element| {
                element
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string()
            })
            .unwrap_or_default()
    }

    /// Extracts the meta description content attribute.
    fn extract_meta_description(&self, document: &Html) -> String {
        document
            .select(&self.description_selector)
            .next()
            .and_then(|element| element.value().attr("content"))
            .map(|content| content.trim().to_string())
            .unwrap_or_default()
    }

    /// Extracts all headings (h1 through h6) in document order.
    fn extract_headings(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.heading_selector)
            .map(|element| {
                element
                    .text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string()
            })
            .filter(|heading| !heading.is_empty())
            .collect()
    }

    /// Extracts anchor targets, resolved against `base_url`, normalized, and
    /// deduplicated. Non-http(s) schemes are dropped.
    fn extract_links(&self, document: &Html, base_url: &str) -> Vec<String> {
        let base = match Url::parse(base_url) {
            Ok(base) => base,
            Err(_) => return Vec::new(),
        };

        let mut links: Vec<String> = document
            .select(&self.link_selector)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| base.join(href).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .map(|url| normalize_url(&url))
            .collect();

        links.sort();
        links.dedup();
        links
    }

    /// Cleans the extracted text by normalizing whitespace and applying the
    /// per-page content cap.
    fn clean_text(&self, text: &str) -> String {
        let cleaned = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if cleaned.chars().count() > self.max_content_length {
            let cut: String = cleaned.chars().take(self.max_content_length).collect();
            format!("{}...", cut)
        } else {
            cleaned
        }
    }
}

/// Normalizes a URL for frontier bookkeeping: query and fragment removed,
/// trailing slash trimmed. Two spellings of the same page compare equal
/// after this.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_query(None);
    normalized.set_fragment(None);
    normalized.to_string().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <!DOCTYPE html>
        <html>
            <head>
                <title>Acme Corp - Widgets</title>
                <meta name="description" content="Acme builds widgets for enterprises">
            </head>
            <body>
                <nav><a href="/login">Login</a></nav>
                <main>
                    <h1>Acme Corp</h1>
                    <h2>What we do</h2>
                    <p>We build industrial widgets.</p>
                    <p>Our customers span 12 countries.</p>
                    <a href="/about">About us</a>
                    <a href="https://acme.test/products?utm=x#top">Products</a>
                    <a href="mailto:hello@acme.test">Mail</a>
                </main>
                <footer><p></p></footer>
            </body>
        </html>
    "#;

    /// Tests extraction of content, title, description, and headings.
    #[test]
    fn test_page_extraction() {
        let scraper = ContentScraper::default();
        let page = scraper.extract(PAGE, "https://acme.test/").unwrap();

        assert_eq!(page.title, "Acme Corp - Widgets");
        assert_eq!(page.meta_description, "Acme builds widgets for enterprises");
        assert!(page.content.contains("We build industrial widgets."));
        assert!(page.content.contains("Our customers span 12 countries."));
        assert_eq!(
            page.headings,
            vec!["Acme Corp".to_string(), "What we do".to_string()]
        );
    }

    /// Tests link resolution: relative links become absolute, queries and
    /// fragments are dropped, non-http schemes are skipped.
    #[test]
    fn test_link_extraction() {
        let scraper = ContentScraper::default();
        let page = scraper.extract(PAGE, "https://acme.test/").unwrap();

        assert!(page.links.contains(&"https://acme.test/about".to_string()));
        assert!(page.links.contains(&"https://acme.test/products".to_string()));
        assert!(!page.links.iter().any(|l| l.starts_with("mailto:")));
    }

    /// Tests that a page without recognizable content yields empty text.
    #[test]
    fn test_empty_content() {
        let scraper = ContentScraper::default();
        let page = scraper
            .extract("<html><body><div>raw</div></body></html>", "https://acme.test")
            .unwrap();

        assert!(page.content.is_empty());
    }

    /// Tests the per-page content cap.
    #[test]
    fn test_content_cap() {
        let scraper = ContentScraper::new(10);
        let html = "<html><body><main><p>aaaaa bbbbb ccccc ddddd</p></main></body></html>";
        let page = scraper.extract(html, "https://acme.test").unwrap();

        assert_eq!(page.content, "aaaaa bbbb...");
    }
}
