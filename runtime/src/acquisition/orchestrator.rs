// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ordered fallback across the acquisition strategies.

use super::browser_scrape::BrowserScrape;
use super::direct_api::DirectApi;
use super::http_client::HttpClient;
use super::mirror::MirrorProxy;
use super::Strategy;
use crate::challenge::ChallengeResolver;
use crate::config::Config;
use crate::error::{FeedError, FeedResult};
use crate::events::{EventBus, FeedEvent};
use crate::model::{RawRecord, StrategyKind};
use crate::renderer::BrowserLauncher;
use crate::session::SessionStore;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// The first list a strategy produced, with its origin.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub source: StrategyKind,
    pub records: Vec<RawRecord>,
}

/// Anything that can supply the cache with raw records.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Fails with [`FeedError::RefreshFailed`] when nothing produced a list.
    async fn fetch(&self) -> FeedResult<Acquired>;
}

/// Tries each strategy in order and stops at the first that yields a list.
///
/// An empty list counts as a result and ends the walk.
pub struct FallbackOrchestrator {
    strategies: Vec<Arc<dyn Strategy>>,
    events: EventBus,
}

impl FallbackOrchestrator {
    pub fn new(strategies: Vec<Arc<dyn Strategy>>, events: EventBus) -> Self {
        Self { strategies, events }
    }

    /// Standard chain: direct API, mirror, browser scrape.
    pub fn from_config(
        config: &Config,
        launcher: Arc<dyn BrowserLauncher>,
        resolver: Arc<ChallengeResolver>,
        events: EventBus,
    ) -> Result<Self> {
        let http = HttpClient::new(config.request_timeout)?;
        let direct = DirectApi::new(
            http.clone(),
            config.source_api_url.clone(),
            config.source_page_url.clone(),
        );
        let mirror = MirrorProxy::new(http, config.mirror_url.clone());
        let browser = BrowserScrape::new(
            config.browser_enabled,
            launcher,
            SessionStore::new(config.session_dir()),
            resolver,
            config.source_page_url.clone(),
            config.navigation_timeout,
        )
        .with_artifact_dir(config.debug_dir());

        Ok(Self::new(
            vec![Arc::new(direct), Arc::new(mirror), Arc::new(browser)],
            events,
        ))
    }

    /// Order in which strategies are attempted.
    pub fn order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Walk the chain. `None` when every strategy was unavailable.
    pub async fn acquire(&self) -> Option<Acquired> {
        for strategy in &self.strategies {
            let kind = strategy.kind();
            info!("acquisition: trying {kind}");
            match strategy.attempt().await {
                Ok(records) => {
                    info!("acquisition: {kind} returned {} records", records.len());
                    self.events.emit(FeedEvent::StrategySucceeded {
                        strategy: kind,
                        records: records.len(),
                    });
                    return Some(Acquired {
                        source: kind,
                        records,
                    });
                }
                Err(e) => {
                    warn!("acquisition: {e}");
                    self.events.emit(FeedEvent::StrategyUnavailable {
                        strategy: kind,
                        reason: e.to_string(),
                    });
                }
            }
        }
        warn!("acquisition: every strategy was unavailable");
        None
    }

    /// Raw records from the first successful strategy, or an empty list.
    pub async fn fetch_raw(&self) -> Vec<RawRecord> {
        self.acquire()
            .await
            .map(|acquired| acquired.records)
            .unwrap_or_default()
    }
}

#[async_trait]
impl MatchSource for FallbackOrchestrator {
    async fn fetch(&self) -> FeedResult<Acquired> {
        self.acquire().await.ok_or_else(|| {
            FeedError::RefreshFailed("every acquisition strategy was unavailable".into())
        })
    }
}
