// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Third-party mirror of the source data endpoint.

use super::http_client::HttpClient;
use super::{tag_records, Strategy};
use crate::error::{FeedError, FeedResult};
use crate::model::{RawRecord, StrategyKind};
use async_trait::async_trait;
use tracing::info;
use url::Url;

const KIND: StrategyKind = StrategyKind::Mirror;

/// Lower trust than the source API, but far cheaper than a browser.
pub struct MirrorProxy {
    http: HttpClient,
    url: Url,
}

impl MirrorProxy {
    pub fn new(http: HttpClient, url: Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl Strategy for MirrorProxy {
    fn kind(&self) -> StrategyKind {
        KIND
    }

    async fn attempt(&self) -> FeedResult<Vec<RawRecord>> {
        info!("mirror: GET {}", self.url);
        let res = self
            .http
            .get(&self.url, &[("accept", "application/json")])
            .await
            .map_err(|e| FeedError::unavailable(KIND, format!("{e:#}")))?;

        if res.status != 200 {
            return Err(FeedError::unavailable(KIND, format!("status {}", res.status)));
        }
        res.json_list()
            .map(|items| tag_records(KIND, items))
            .ok_or_else(|| FeedError::unavailable(KIND, "response body is not a list"))
    }
}
