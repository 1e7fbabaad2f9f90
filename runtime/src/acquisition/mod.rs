// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered acquisition of raw match records.
//!
//! Strategies are tried cheapest first: the direct API (with its embedded
//! cookie-bootstrap retry), the third-party mirror, and finally a full browser
//! scrape. Each strategy swallows its own network and automation errors and
//! reports [`FeedError::StrategyUnavailable`](crate::error::FeedError) instead.

pub mod browser_scrape;
pub mod direct_api;
pub mod http_client;
pub mod mirror;
pub mod orchestrator;

use crate::error::FeedResult;
use crate::model::{RawRecord, StrategyKind};
use async_trait::async_trait;
use serde_json::Value;

/// One way of obtaining the raw match list.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Try to obtain the raw list. An error means not-applicable.
    async fn attempt(&self) -> FeedResult<Vec<RawRecord>>;
}

/// Tag a list of JSON values with the strategy that produced them.
pub(crate) fn tag_records(source: StrategyKind, items: Vec<Value>) -> Vec<RawRecord> {
    items
        .into_iter()
        .map(|fields| RawRecord::new(source, fields))
        .collect()
}
