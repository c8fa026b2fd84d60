//! HTTP fetch client
//!
//! One rate-unaware GET per call: the client knows nothing about retries,
//! delays, or the frontier. Retry policy belongs to the scheduler. Failures
//! come back as typed values, never as panics, so the scheduler can decide
//! whether to skip, retry, or abort.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Typed failure of a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

impl FetchError {
    /// Transient errors are worth retrying; permanent ones are not.
    ///
    /// 4xx responses are treated as permanent (the page is gone or forbidden),
    /// 5xx and network-level failures as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpStatus(code) => *code >= 500,
        }
    }
}

/// A successfully fetched page with its outbound links
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: String,

    /// Raw page body
    pub body: String,

    /// Absolute outbound links found in the body (HTML pages only)
    pub links: Vec<String>,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Builds the shared HTTP client
///
/// The per-request timeout is applied per call in [`fetch_page`]; the builder
/// only sets the connect timeout and identification.
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single URL with the given timeout
///
/// Returns the page body and its outbound links, or a typed failure:
///
/// | Condition            | Result                     |
/// |----------------------|----------------------------|
/// | Timeout              | `FetchError::Timeout`      |
/// | Connect/read failure | `FetchError::ConnectionFailed` |
/// | Non-2xx status       | `FetchError::HttpStatus`   |
///
/// No retry happens here and no shared state is touched.
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.as_str())
        .timeout(timeout)
        .send()
        .await
        .map_err(classify_request_error)?;

    let status: StatusCode = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let final_url = response.url().clone();

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::ConnectionFailed(format!("body read failed: {}", e)))?;

    // Only HTML bodies yield outbound links
    let links = if content_type.contains("text/html") || content_type.is_empty() {
        extract_links(&body, &final_url)
    } else {
        Vec::new()
    };

    Ok(FetchedPage {
        url: final_url,
        status: status.as_u16(),
        content_type,
        body,
        links,
        fetched_at: Utc::now(),
    })
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::ConnectionFailed("connection refused".to_string())
    } else {
        FetchError::ConnectionFailed(e.to_string())
    }
}

/// Extracts all followable links from an HTML body, resolved against `base_url`
///
/// Excluded: `javascript:`, `mailto:`, `tel:`, `data:` schemes, fragment-only
/// anchors, and `<a download>` links. Relative hrefs are resolved to absolute.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
