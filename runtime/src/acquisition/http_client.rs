// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Async HTTP client wrapping reqwest.
//!
//! Not a browser: plain HTTP requests with browser-like headers. Every call is
//! a single request: no retries, so callers stay in control of how many round
//! trips a strategy makes.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Desktop user agent for plain HTTP requests.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/120.0.0.0 Safari/537.36";

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// All response headers, repeated names preserved in order.
    pub headers: Vec<(String, String)>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Values of every `Set-Cookie` header.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(SET_COOKIE.as_str()))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The body as a JSON list, if it is one.
    pub fn json_list(&self) -> Option<Vec<Value>> {
        match serde_json::from_str::<Value>(&self.body) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

/// Build a `Cookie` request header from `Set-Cookie` values.
///
/// Keeps each `name=value` pair and drops the attributes.
pub fn cookie_header<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let pairs: Vec<&str> = set_cookies
        .into_iter()
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// HTTP client for the acquisition strategies.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with the desktop user agent.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client, timeout })
    }

    /// Perform one GET request with the given extra headers.
    pub async fn get(&self, url: &Url, extra_headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut headers = HeaderMap::new();
        for (name, value) in extra_headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("invalid header name {name:?}"))?,
                HeaderValue::from_str(value)
                    .with_context(|| format!("invalid value for header {name}"))?,
            );
        }

        let r = self
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();

        let headers: Vec<(String, String)> = r
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = r.text().await.unwrap_or_default();

        Ok(HttpResponse {
            final_url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            final_url: "https://example.org".to_string(),
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_cookie_header_strips_attributes() {
        let header = cookie_header([
            "__cf_bm=abc123; path=/; expires=Thu, 01 Jan 2030 00:00:00 GMT; HttpOnly",
            "session=xyz; Secure",
        ]);
        assert_eq!(header.as_deref(), Some("__cf_bm=abc123; session=xyz"));
    }

    #[test]
    fn test_cookie_header_empty() {
        assert_eq!(cookie_header(Vec::<&str>::new()), None);
        assert_eq!(cookie_header(["; path=/"]), None);
    }

    #[test]
    fn test_set_cookies_collects_repeated_headers() {
        let resp = response(
            &[
                ("set-cookie", "a=1; path=/"),
                ("content-type", "text/html"),
                ("Set-Cookie", "b=2"),
            ],
            "",
        );
        assert_eq!(resp.set_cookies(), vec!["a=1; path=/", "b=2"]);
    }

    #[test]
    fn test_json_list_requires_array() {
        assert_eq!(response(&[], "[1,2]").json_list().map(|l| l.len()), Some(2));
        assert!(response(&[], r#"{"matches":[]}"#).json_list().is_none());
        assert!(response(&[], "<html>").json_list().is_none());
    }

    #[test]
    fn test_http_client_creation() {
        assert!(HttpClient::new(Duration::from_secs(10)).is_ok());
    }
}
