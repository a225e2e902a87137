use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CrewflowError;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

static RESULT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("invalid result link regex")
});
static RESULT_SNIPPET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
        .expect("invalid result snippet regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("invalid tag regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("invalid ws regex"));

/// One parsed search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Client for the DuckDuckGo HTML results endpoint.
///
/// Issues one blocking-style GET per query; no caching, no retry, no
/// rate-limiting.
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SearchClient {
    pub fn new() -> Result<Self, CrewflowError> {
        Self::with_endpoint(SEARCH_ENDPOINT)
    }

    /// Point the client at a different results endpoint (tests, mirrors).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, CrewflowError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Run a query and return up to `limit` parsed results.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, CrewflowError> {
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        debug!(%query, "issuing search request");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrewflowError::SearchStatus(status));
        }

        let body = response.text().await?;
        let hits = parse_results(&body, limit);
        if hits.is_empty() {
            warn!(%query, "search returned no parseable results");
        }
        Ok(hits)
    }
}

/// Extract result entries from the endpoint's HTML.
///
/// Each organic result lives in its own `result__body` block; ads and
/// duckduckgo-internal links carry no `uddg` redirect target and are dropped.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    for block in html.split("result__body").skip(1) {
        if hits.len() >= limit {
            break;
        }

        let Some(link) = RESULT_LINK.captures(block) else {
            continue;
        };
        let Some(url) = resolve_result_url(&link[1]) else {
            continue;
        };
        let title = clean_fragment(&link[2]);
        if title.is_empty() {
            continue;
        }

        let snippet = RESULT_SNIPPET
            .captures(block)
            .map(|caps| clean_fragment(&caps[1]))
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            url,
            snippet,
        });
    }

    hits
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect hrefs back to the target URL.
fn resolve_result_url(href: &str) -> Option<String> {
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + 5..];
        let encoded = match encoded.find('&') {
            Some(end) => &encoded[..end],
            None => encoded,
        };
        return urlencoding::decode(encoded).ok().map(|url| url.into_owned());
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        if href.contains("duckduckgo.com") {
            return None;
        }
        return Some(href.to_string());
    }

    None
}

fn clean_fragment(raw: &str) -> String {
    let stripped = TAG.replace_all(raw, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    // `&amp;` last so author-escaped entities stay escaped once.
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Render hits in the deep adapter's entry format.
pub fn format_deep_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "Source: {}\nTitle: {}\nSnippet: {}",
                hit.url, hit.title, hit.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recover hits from deep-adapter text. Unrecognized text yields no hits.
pub fn parse_deep_results(text: &str) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    for block in text.split("\n\n") {
        let mut url = None;
        let mut title = None;
        let mut snippet = String::new();

        for line in block.lines() {
            if let Some(value) = line.strip_prefix("Source: ") {
                url = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Title: ") {
                title = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Snippet: ") {
                snippet = value.trim().to_string();
            }
        }

        if let (Some(url), Some(title)) = (url, title) {
            if !url.is_empty() && !title.is_empty() {
                hits.push(SearchHit {
                    title,
                    url,
                    snippet,
                });
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
<div class="serp__results">
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fquantum&amp;rut=abc123">Quantum <b>Computing</b> Advances &amp; Outlook</a>
    </h2>
    <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fquantum">Researchers demonstrated a <b>512-qubit</b> processor this year.</a>
  </div>
</div>
<div class="result result--ad">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_domain=ads.example">Sponsored result</a>
    </h2>
  </div>
</div>
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://research.example.edu/report">Annual Report</a>
    </h2>
    <a class="result__snippet" href="https://research.example.edu/report">Error rates fell below the fault&#x27;s threshold.</a>
  </div>
</div>
</div>
"#;

    #[test]
    fn parses_results_with_redirects_and_entities() {
        let hits = parse_results(FIXTURE, 10);

        assert_eq!(hits.len(), 2, "ad entry should be dropped: {hits:?}");

        assert_eq!(hits[0].url, "https://example.org/quantum");
        assert_eq!(hits[0].title, "Quantum Computing Advances & Outlook");
        assert_eq!(
            hits[0].snippet,
            "Researchers demonstrated a 512-qubit processor this year."
        );

        assert_eq!(hits[1].url, "https://research.example.edu/report");
        assert_eq!(hits[1].snippet, "Error rates fell below the fault's threshold.");
    }

    #[test]
    fn limit_truncates_results() {
        let hits = parse_results(FIXTURE, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://example.org/quantum");
    }

    #[test]
    fn redirect_resolution_handles_all_href_shapes() {
        assert_eq!(
            resolve_result_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example%2Fx&rut=1"),
            Some("https://a.example/x".to_string())
        );
        assert_eq!(
            resolve_result_url("https://plain.example/page"),
            Some("https://plain.example/page".to_string())
        );
        assert_eq!(resolve_result_url("https://duckduckgo.com/y.js?ad=1"), None);
        assert_eq!(resolve_result_url("/settings"), None);
    }

    #[test]
    fn deep_format_and_parse_invert() {
        let hits = vec![
            SearchHit {
                title: "First".into(),
                url: "https://one.example".into(),
                snippet: "Alpha".into(),
            },
            SearchHit {
                title: "Second".into(),
                url: "https://two.example".into(),
                snippet: "Beta".into(),
            },
        ];

        let text = format_deep_results(&hits);
        assert!(text.starts_with("Source: https://one.example\nTitle: First\nSnippet: Alpha"));
        assert_eq!(parse_deep_results(&text), hits);
    }

    #[test]
    fn deep_parse_ignores_unstructured_text() {
        assert!(parse_deep_results("Search tool 'Deep Search' failed: timed out").is_empty());
        assert!(parse_deep_results("").is_empty());
    }
}
