//! Web search and article extraction for the research agent.
//!
//! Both entry points fail soft: any transport or parse error is logged and
//! degraded to an empty result. Errors never cross this boundary.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; Roundtable/0.1)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Visible page text is truncated to these many characters.
const MAX_TEXT_CHARS: usize = 5000;
const MAX_SUMMARY_CHARS: usize = 500;

// DuckDuckGo's HTML endpoint marks results with result__a / result__snippet.
static RESULT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="result__a"[^>]*href="([^"]*)"[^>]*>([^<]+)</a>"#)
        .expect("invalid result link regex")
});
static RESULT_SNIPPET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="result__snippet"[^>]*>([^<]+)"#).expect("invalid snippet regex")
});
static PAGE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("invalid title regex"));
static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")
        .expect("invalid script/style regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("invalid tag regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub title: String,
    pub text: String,
    pub summary: String,
}

/// Web search client over DuckDuckGo's HTML interface.
#[derive(Debug, Clone)]
pub struct WebSearcher {
    http: reqwest::Client,
    max_results: usize,
}

impl WebSearcher {
    pub fn new(max_results: usize) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, max_results }
    }

    /// Search the web, returning at most `max_results` entries. Any failure
    /// yields an empty list.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let url = format!("{SEARCH_ENDPOINT}?q={}", urlencoding::encode(query));

        let html = match self.fetch(&url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(%query, error = %err, "web search failed");
                return Vec::new();
            }
        };

        let results = parse_search_results(&html, self.max_results);
        debug!(%query, count = results.len(), "web search completed");
        results
    }

    /// Extract readable content from a page: title plus visible text,
    /// truncated. Any failure yields the default (empty) article.
    pub async fn extract(&self, url: &str) -> ExtractedArticle {
        let html = match self.fetch(url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(%url, error = %err, "content extraction failed");
                return ExtractedArticle::default();
            }
        };

        extract_article(&html)
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

fn parse_search_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| decode_entities(m.as_str())))
        .collect();

    RESULT_LINK
        .captures_iter(html)
        .enumerate()
        .take(max_results)
        .filter_map(|(idx, cap)| {
            let link = unwrap_redirect(cap.get(1)?.as_str());
            let title = decode_entities(cap.get(2)?.as_str());
            if title.is_empty() {
                return None;
            }
            Some(SearchResult {
                title,
                link,
                snippet: snippets.get(idx).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// DuckDuckGo wraps result links in a redirect carrying the target in the
/// `uddg` query parameter.
fn unwrap_redirect(link: &str) -> String {
    if let Some(encoded) = link.split("uddg=").nth(1) {
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    link.to_string()
}

fn extract_article(html: &str) -> ExtractedArticle {
    let title = PAGE_TITLE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| decode_entities(m.as_str()))
        .unwrap_or_default();

    let stripped = SCRIPT_STYLE.replace_all(html, " ");
    let text = TAG.replace_all(&stripped, " ");
    let text = decode_entities(&text);
    let text: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

    ExtractedArticle {
        title,
        summary: truncate_chars(&text, MAX_SUMMARY_CHARS),
        text: truncate_chars(&text, MAX_TEXT_CHARS),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Farticle&rut=abc">Example &amp; Friends</a>
        <a class="result__snippet" href="#">A snippet about the &quot;topic&quot;</a>
        <a class="result__a" href="https://plain.example.org/page">Plain Result</a>
        <a class="result__snippet" href="#">Second snippet</a>
    "#;

    #[test]
    fn parses_results_and_unwraps_redirects() {
        let results = parse_search_results(FIXTURE, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Example & Friends");
        assert_eq!(results[0].link, "https://example.com/article");
        assert_eq!(results[0].snippet, "A snippet about the \"topic\"");
        assert_eq!(results[1].link, "https://plain.example.org/page");
    }

    #[test]
    fn respects_max_results() {
        let results = parse_search_results(FIXTURE, 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn malformed_html_yields_empty() {
        assert!(parse_search_results("<html><body>nothing here", 5).is_empty());
    }

    #[test]
    fn extracts_visible_text_and_truncates() {
        let mut body = String::from(
            "<html><head><title>My Page</title><style>body { color: red }</style></head><body><script>var x = 1;</script><p>Hello world.</p>",
        );
        for _ in 0..600 {
            body.push_str("<p>filler text block</p>");
        }
        body.push_str("</body></html>");

        let article = extract_article(&body);
        assert_eq!(article.title, "My Page");
        assert!(article.text.starts_with("My Page Hello world."));
        assert!(!article.text.contains("color: red"));
        assert!(!article.text.contains("var x"));
        assert!(article.text.chars().count() <= MAX_TEXT_CHARS);
        assert!(article.summary.chars().count() <= MAX_SUMMARY_CHARS);
    }
}
