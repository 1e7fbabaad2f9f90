// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Direct call to the source data endpoint.
//!
//! On 401/403 the strategy makes exactly one more attempt: it fetches the
//! human-facing listing page purely to harvest `Set-Cookie` headers, then
//! replays the API request with those cookies.

use super::http_client::{cookie_header, HttpClient, HttpResponse};
use super::{tag_records, Strategy};
use crate::error::{FeedError, FeedResult};
use crate::model::{RawRecord, StrategyKind};
use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

const KIND: StrategyKind = StrategyKind::DirectApi;

pub struct DirectApi {
    http: HttpClient,
    api_url: Url,
    page_url: Url,
}

impl DirectApi {
    pub fn new(http: HttpClient, api_url: Url, page_url: Url) -> Self {
        Self {
            http,
            api_url,
            page_url,
        }
    }

    fn browser_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("accept", "application/json, text/plain, */*".to_string()),
            ("referer", self.page_url.to_string()),
            ("accept-language", "en-US,en;q=0.9".to_string()),
            ("cache-control", "no-cache".to_string()),
            ("pragma", "no-cache".to_string()),
        ]
    }

    async fn request(&self, url: &Url, cookie: Option<&str>) -> FeedResult<HttpResponse> {
        let mut headers = self.browser_headers();
        if let Some(cookie) = cookie {
            headers.push(("cookie", cookie.to_string()));
        }
        let borrowed: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.http
            .get(url, &borrowed)
            .await
            .map_err(|e| FeedError::unavailable(KIND, format!("{e:#}")))
    }

    /// The single cookie-bootstrapped retry after a 401/403.
    async fn retry_with_cookies(&self, first_status: u16) -> FeedResult<Vec<RawRecord>> {
        info!(
            "direct API returned {first_status}; harvesting cookies from {}",
            self.page_url
        );
        let page = self.request(&self.page_url, None).await?;
        let Some(cookie) = cookie_header(page.set_cookies()) else {
            warn!("listing page returned no Set-Cookie headers");
            return Err(FeedError::unavailable(
                KIND,
                format!("status {first_status}, no cookies obtainable"),
            ));
        };

        info!("retrying direct API with harvested cookies");
        let retry = self.request(&self.api_url, Some(&cookie)).await?;
        accept(&retry).ok_or_else(|| {
            FeedError::unavailable(KIND, format!("cookie retry returned status {}", retry.status))
        })
    }
}

/// Success means HTTP 200 with a JSON list body.
fn accept(res: &HttpResponse) -> Option<Vec<RawRecord>> {
    if res.status != 200 {
        return None;
    }
    res.json_list().map(|items| tag_records(KIND, items))
}

#[async_trait]
impl Strategy for DirectApi {
    fn kind(&self) -> StrategyKind {
        KIND
    }

    async fn attempt(&self) -> FeedResult<Vec<RawRecord>> {
        info!("direct API: GET {}", self.api_url);
        let res = self.request(&self.api_url, None).await?;

        if let Some(records) = accept(&res) {
            return Ok(records);
        }

        match res.status {
            401 | 403 => self.retry_with_cookies(res.status).await,
            200 => Err(FeedError::unavailable(KIND, "response body is not a list")),
            status => Err(FeedError::unavailable(KIND, format!("status {status}"))),
        }
    }
}
