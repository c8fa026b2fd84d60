//! URL handling module for docweld
//!
//! Provides URL normalization (so the frontier's visited set deduplicates
//! reliably) and crawl-scope checks against a source's base URL.

use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "source",
];

/// Normalizes a URL according to docweld's normalization rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or non-HTTP(S)
/// 2. Lowercase the host
/// 3. Remove www. prefix from the host
/// 4. Normalize the path (dot segments, duplicate slashes, trailing slash)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters, sort the rest
///
/// # Examples
///
/// ```
/// use docweld::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/api/page/").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/api/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let mut normalized_host = host.to_lowercase();

        if let Some(stripped) = normalized_host.strip_prefix("www.") {
            normalized_host = stripped.to_string();
        }

        url.set_host(Some(&normalized_host))
            .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = filtered_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Checks whether a URL falls inside the crawl scope of a base URL
///
/// In scope means: same host, and the path starts with the base URL's path.
/// Everything else (other hosts, parent paths) is skipped by the crawler.
pub fn in_scope(url: &Url, base: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    if url.host_str() != base.host_str() || url.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    // Prefix must end on a segment boundary so /api does not admit /apiv2
    let base_path = base.path().trim_end_matches('/');
    let path = url.path();
    path == base_path
        || path
            .strip_prefix(base_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if !normalized_segments.is_empty() {
                    normalized_segments.pop();
                }
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
