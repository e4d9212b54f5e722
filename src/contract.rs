//! Page contracts: everything the engine assumes about one search
//! destination, isolated behind a trait.
//!
//! The destination's markup is outside this crate's control and changes
//! without notice, so URL construction, the results-ready selector, result
//! extraction, and challenge detection all live here. Swapping the contract
//! retargets the engine without touching session or challenge code.

use regex::Regex;
use scraper::{Html, Selector};

use crate::challenge::ChallengeArtifact;
use crate::error::{Result, SearchError};
use crate::query::SearchQuery;
use crate::result::SearchResult;

/// Contract with a single search destination.
pub trait PageContract: Send + Sync {
    /// Destination name for logs.
    fn name(&self) -> &str;

    /// Builds the full search URL for a query.
    fn search_url(&self, query: &SearchQuery) -> String;

    /// CSS selector whose presence means the results page has rendered.
    fn results_selector(&self) -> &str;

    /// Extracts results in page order, tolerating partially-missing fields.
    /// Entries with neither title nor link are dropped. An empty vector is a
    /// valid outcome; errors are reserved for unusable selectors or documents.
    fn extract(&self, html: &str) -> Result<Vec<SearchResult>>;

    /// Inspects a rendered page for an anti-automation challenge. Returns the
    /// artifact a solving service needs, or `None` when no challenge is
    /// present. A detected challenge without an extractable site key still
    /// returns an artifact (with `site_key: None`) so the caller can fail
    /// with the real cause instead of misreading the page as empty.
    fn detect_challenge(&self, page_url: &str, html: &str) -> Option<ChallengeArtifact>;
}

/// Result container selector on the destination SERP.
const RESULT_SELECTOR: &str = "div.g";
/// Title element within a result container.
const TITLE_SELECTOR: &str = "h3";
/// Link element within a result container.
const LINK_SELECTOR: &str = "a[href]";
/// Snippet element within a result container, old and new markup.
const SNIPPET_SELECTOR: &str = "div[data-sncf], div.VwiC3b";

/// Substrings that mark the interstitial challenge page.
const CHALLENGE_MARKERS: &[&str] = &[
    "/sorry/index",
    "google.com/recaptcha",
    "unusual traffic",
    "automated queries",
];

/// The Google results-page contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleSerp;

impl GoogleSerp {
    /// Creates the contract.
    pub fn new() -> Self {
        Self
    }

    fn parse_results(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);

        let container_selector = parse_selector(RESULT_SELECTOR)?;
        let title_selector = parse_selector(TITLE_SELECTOR)?;
        let link_selector = parse_selector(LINK_SELECTOR)?;
        let snippet_selector = parse_selector(SNIPPET_SELECTOR)?;

        let mut results = Vec::new();

        for element in document.select(&container_selector) {
            let title = element
                .select(&title_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty());

            let link = match element.select(&link_selector).next() {
                Some(el) => {
                    let href = el.value().attr("href").unwrap_or_default();
                    // Containers whose only anchor is site-internal are
                    // related-searches blocks, not results
                    if href.starts_with('/') && !href.starts_with("/url?") {
                        continue;
                    }
                    normalize_href(href)
                }
                None => None,
            };

            let snippet = element
                .select(&snippet_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());

            let mut result = SearchResult::new(results.len() + 1);
            result.title = title;
            result.link = link;
            result.snippet = snippet;

            if result.is_substantive() {
                results.push(result);
            }
        }

        Ok(results)
    }
}

impl PageContract for GoogleSerp {
    fn name(&self) -> &str {
        "google"
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "https://www.google.com/search?q={}&hl=en",
            urlencoding::encode(&query.query)
        )
    }

    fn results_selector(&self) -> &str {
        RESULT_SELECTOR
    }

    fn extract(&self, html: &str) -> Result<Vec<SearchResult>> {
        self.parse_results(html)
    }

    fn detect_challenge(&self, page_url: &str, html: &str) -> Option<ChallengeArtifact> {
        let challenged = page_url.contains("/sorry/")
            || CHALLENGE_MARKERS.iter().any(|marker| html.contains(marker));
        if !challenged {
            return None;
        }

        let site_key = first_capture(r#"data-sitekey="([^"]+)""#, html)
            .or_else(|| first_capture(r#"recaptcha[^"']*?[?&]k=([0-9A-Za-z_-]+)"#, html))
            .or_else(|| first_capture(r#""sitekey"\s*:\s*"([^"]+)""#, html));
        let data_s = first_capture(r#"data-s="([^"]+)""#, html);
        let enterprise = html.contains("recaptcha/enterprise") || html.contains("enterprise.js");

        Some(ChallengeArtifact {
            site_key,
            page_url: page_url.to_string(),
            data_s,
            enterprise,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| SearchError::Extraction(format!("failed to parse selector '{css}': {e:?}")))
}

/// Unwraps redirect hrefs to the destination URL; drops empty hrefs.
fn normalize_href(href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    if let Some(q) = href.strip_prefix("/url?q=") {
        let target = q.split('&').next().unwrap_or(q);
        return Some(target.to_string());
    }
    Some(href.to_string())
}

fn first_capture(pattern: &str, haystack: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE_URL: &str = "https://www.google.com/search?q=test&hl=en";

    #[test]
    fn test_search_url_encodes_query() {
        let contract = GoogleSerp::new();
        let url = contract.search_url(&SearchQuery::new("rust async & await"));
        assert_eq!(
            url,
            "https://www.google.com/search?q=rust%20async%20%26%20await&hl=en"
        );
    }

    #[test]
    fn test_results_selector() {
        let contract = GoogleSerp::new();
        assert_eq!(contract.results_selector(), "div.g");
    }

    #[test]
    fn test_extract_empty_html() {
        let contract = GoogleSerp::new();
        let results = contract.extract("<html><body></body></html>").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_extract_full_results() {
        let contract = GoogleSerp::new();
        let html = r#"
            <html>
            <body>
                <div class="g">
                    <a href="https://www.rust-lang.org/">
                        <h3>Rust Programming Language</h3>
                    </a>
                    <div class="VwiC3b">A language empowering everyone to build reliable software.</div>
                </div>
                <div class="g">
                    <a href="https://doc.rust-lang.org/book/">
                        <h3>The Rust Programming Language Book</h3>
                    </a>
                    <div data-sncf="1">The official book.</div>
                </div>
            </body>
            </html>
        "#;
        let results = contract.extract(html).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].title.as_deref(), Some("Rust Programming Language"));
        assert_eq!(results[0].link.as_deref(), Some("https://www.rust-lang.org/"));
        assert_eq!(
            results[0].snippet.as_deref(),
            Some("A language empowering everyone to build reliable software.")
        );
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[1].snippet.as_deref(), Some("The official book."));
    }

    #[test]
    fn test_extract_unwraps_redirect_links() {
        let contract = GoogleSerp::new();
        let html = r#"
            <div class="g">
                <a href="/url?q=https://example.com/page&sa=U">
                    <h3>Example Page</h3>
                </a>
            </div>
        "#;
        let results = contract.extract(html).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].link.as_deref(), Some("https://example.com/page"));
    }

    #[test]
    fn test_extract_skips_internal_link_containers() {
        let contract = GoogleSerp::new();
        let html = r#"
            <div class="g">
                <a href="/search?q=related">
                    <h3>Related Search</h3>
                </a>
            </div>
        "#;
        let results = contract.extract(html).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_extract_keeps_result_without_title() {
        let contract = GoogleSerp::new();
        let html = r#"
            <div class="g">
                <a href="https://example.com/untitled">plain anchor text</a>
            </div>
        "#;
        let results = contract.extract(html).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].title.is_none());
        assert_eq!(results[0].link.as_deref(), Some("https://example.com/untitled"));
    }

    #[test]
    fn test_extract_keeps_result_without_snippet() {
        let contract = GoogleSerp::new();
        let html = r#"
            <div class="g">
                <a href="https://example.com/"><h3>Example</h3></a>
            </div>
        "#;
        let results = contract.extract(html).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].snippet.is_none());
    }

    #[test]
    fn test_extract_drops_container_with_neither_title_nor_link() {
        let contract = GoogleSerp::new();
        let html = r#"
            <div class="g">
                <div class="VwiC3b">an orphan snippet</div>
            </div>
        "#;
        let results = contract.extract(html).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_extract_preserves_page_order() {
        let contract = GoogleSerp::new();
        let html = r#"
            <div class="g"><a href="https://a.example/"><h3>A</h3></a></div>
            <div class="g"><a href="https://b.example/"><h3>B</h3></a></div>
            <div class="g"><a href="https://c.example/"><h3>C</h3></a></div>
        "#;
        let results = contract.extract(html).unwrap();
        let titles: Vec<_> = results.iter().filter_map(|r| r.title.as_deref()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        let ranks: Vec<_> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_detect_challenge_none_on_results_page() {
        let contract = GoogleSerp::new();
        let html = r#"<div class="g"><a href="https://a.example/"><h3>A</h3></a></div>"#;
        assert!(contract.detect_challenge(SEARCH_PAGE_URL, html).is_none());
    }

    #[test]
    fn test_detect_challenge_from_sorry_url() {
        let contract = GoogleSerp::new();
        let page_url = "https://www.google.com/sorry/index?continue=https://www.google.com/search";
        let html = r#"<form action="index"><div class="g-recaptcha"
            data-sitekey="6LfwuyUTAAAAAOAmoS0fdqijC2PbbdH4kjq62Y1b"></div></form>"#;
        let artifact = contract.detect_challenge(page_url, html).unwrap();
        assert_eq!(
            artifact.site_key.as_deref(),
            Some("6LfwuyUTAAAAAOAmoS0fdqijC2PbbdH4kjq62Y1b")
        );
        assert_eq!(artifact.page_url, page_url);
        assert!(!artifact.enterprise);
    }

    #[test]
    fn test_detect_challenge_site_key_from_iframe() {
        let contract = GoogleSerp::new();
        let html = r#"<iframe
            src="https://www.google.com/recaptcha/api2/anchor?ar=1&k=6LfwuyUTAAAAAOAmoS0fdqijC2PbbdH4kjq62Y1b&co=x">
            </iframe>"#;
        let artifact = contract.detect_challenge(SEARCH_PAGE_URL, html).unwrap();
        assert_eq!(
            artifact.site_key.as_deref(),
            Some("6LfwuyUTAAAAAOAmoS0fdqijC2PbbdH4kjq62Y1b")
        );
    }

    #[test]
    fn test_detect_challenge_site_key_from_inline_config() {
        let contract = GoogleSerp::new();
        let html = r#"<script>grecaptcha.render(el, {"sitekey": "inline-key-123"});</script>
            <p>Our systems have detected unusual traffic from your computer network.</p>"#;
        let artifact = contract.detect_challenge(SEARCH_PAGE_URL, html).unwrap();
        assert_eq!(artifact.site_key.as_deref(), Some("inline-key-123"));
    }

    #[test]
    fn test_detect_challenge_captures_data_s() {
        let contract = GoogleSerp::new();
        let html = r#"<div class="g-recaptcha" data-sitekey="key-1"
            data-s="one-time-payload-abc"></div>"#;
        let artifact = contract
            .detect_challenge("https://www.google.com/sorry/index", html)
            .unwrap();
        assert_eq!(artifact.data_s.as_deref(), Some("one-time-payload-abc"));
    }

    #[test]
    fn test_detect_challenge_enterprise_flag() {
        let contract = GoogleSerp::new();
        let html = r#"<script src="https://www.google.com/recaptcha/enterprise.js"></script>
            <div data-sitekey="key-e"></div>"#;
        let artifact = contract.detect_challenge(SEARCH_PAGE_URL, html).unwrap();
        assert!(artifact.enterprise);
    }

    #[test]
    fn test_detect_challenge_without_site_key() {
        let contract = GoogleSerp::new();
        let html = "<p>Our systems have detected unusual traffic.</p>";
        let artifact = contract.detect_challenge(SEARCH_PAGE_URL, html).unwrap();
        assert!(artifact.site_key.is_none());
    }

    #[test]
    fn test_normalize_href_plain() {
        assert_eq!(
            normalize_href("https://example.com/x"),
            Some("https://example.com/x".to_string())
        );
    }

    #[test]
    fn test_normalize_href_empty() {
        assert_eq!(normalize_href(""), None);
    }
}
