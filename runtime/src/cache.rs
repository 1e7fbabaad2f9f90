// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Snapshot cache with single-flight refresh.
//!
//! Readers clone an `Arc<Snapshot>` under a short read lock and never wait
//! on a refresh. A refresh holds `refresh_lock` for its whole duration,
//! including any human challenge wait, and takes the state write lock only
//! for the final swap.

use crate::acquisition::orchestrator::MatchSource;
use crate::error::{panic_message, FeedError};
use crate::events::{now_timestamp, EventBus, FeedEvent};
use crate::model::{CanonicalMatch, MatchStatus, Snapshot, StrategyKind};
use crate::normalize::Normalizer;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

struct CacheState {
    snapshot: Arc<Snapshot>,
    last_refreshed: Option<DateTime<Utc>>,
    last_source: Option<StrategyKind>,
}

/// Point-in-time cache metadata for the read API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub last_updated: Option<DateTime<Utc>>,
    pub source: Option<StrategyKind>,
    pub refreshing: bool,
    pub live: usize,
    pub upcoming: usize,
    pub finished: usize,
}

pub struct CacheManager {
    source: Arc<dyn MatchSource>,
    normalizer: Normalizer,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
    events: EventBus,
}

impl CacheManager {
    pub fn new(source: Arc<dyn MatchSource>, normalizer: Normalizer, events: EventBus) -> Self {
        Self {
            source,
            normalizer,
            state: RwLock::new(CacheState {
                snapshot: Arc::new(Snapshot::empty()),
                last_refreshed: None,
                last_source: None,
            }),
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// The cached snapshot, without ever refreshing.
    pub async fn current(&self) -> Arc<Snapshot> {
        self.state.read().await.snapshot.clone()
    }

    /// The cached snapshot, refreshed first when every partition is empty.
    pub async fn get_snapshot(&self) -> Arc<Snapshot> {
        let snapshot = self.current().await;
        if snapshot.is_empty() {
            return self.refresh_for_read().await;
        }
        snapshot
    }

    /// One partition, refreshed first when that partition is empty.
    pub async fn get_partition(&self, status: MatchStatus) -> Vec<CanonicalMatch> {
        let mut snapshot = self.current().await;
        if snapshot.partition(status).is_empty() {
            snapshot = self.refresh_for_read().await;
        }
        snapshot.partition(status).to_vec()
    }

    pub async fn get_live(&self) -> Vec<CanonicalMatch> {
        self.get_partition(MatchStatus::Live).await
    }

    pub async fn get_upcoming(&self) -> Vec<CanonicalMatch> {
        self.get_partition(MatchStatus::Upcoming).await
    }

    pub async fn get_finished(&self) -> Vec<CanonicalMatch> {
        self.get_partition(MatchStatus::Finished).await
    }

    /// Re-run acquisition and normalization.
    ///
    /// A caller arriving while another refresh is in flight waits for that
    /// one and returns its result instead of starting a second pipeline run.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        match self.refresh_lock.try_lock() {
            Ok(_guard) => self.run_refresh().await,
            Err(_) => {
                debug!("refresh already in flight; joining it");
                let _joined = self.refresh_lock.lock().await;
                self.current().await
            }
        }
    }

    /// Lazy refresh on behalf of a read view.
    ///
    /// Once the cache has been populated, a read never queues behind an
    /// in-flight refresh: that refresh may be parked on a human challenge, so
    /// the last good snapshot is served instead. Only a cache that has never
    /// been filled waits.
    async fn refresh_for_read(&self) -> Arc<Snapshot> {
        if self.is_refreshing() {
            let state = self.state.read().await;
            if state.last_refreshed.is_some() {
                debug!("refresh in flight; serving the last good snapshot");
                return state.snapshot.clone();
            }
        }
        self.refresh().await
    }

    /// Refresh unless one is already running. Used by the background timer.
    pub async fn refresh_if_idle(&self) -> Option<Arc<Snapshot>> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            debug!("refresh already in flight; skipping tick");
            return None;
        };
        Some(self.run_refresh().await)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }

    pub async fn status(&self) -> CacheStatus {
        let refreshing = self.is_refreshing();
        let state = self.state.read().await;
        CacheStatus {
            last_updated: state.last_refreshed,
            source: state.last_source,
            refreshing,
            live: state.snapshot.live.len(),
            upcoming: state.snapshot.upcoming.len(),
            finished: state.snapshot.finished.len(),
        }
    }

    async fn run_refresh(&self) -> Arc<Snapshot> {
        let started = Instant::now();
        self.events.emit(FeedEvent::RefreshStarted {
            timestamp: now_timestamp(),
        });

        let fetched = match AssertUnwindSafe(self.source.fetch()).catch_unwind().await {
            Ok(fetched) => fetched,
            Err(panic) => Err(FeedError::RefreshFailed(format!(
                "acquisition panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match fetched {
            Ok(acquired) => {
                let snapshot = Arc::new(self.normalizer.normalize(&acquired.records));
                {
                    let mut state = self.state.write().await;
                    state.snapshot = snapshot.clone();
                    state.last_refreshed = Some(snapshot.timestamp);
                    state.last_source = Some(acquired.source);
                }
                info!(
                    "cache refreshed from {} in {elapsed_ms}ms: live={} upcoming={} finished={}",
                    acquired.source,
                    snapshot.live.len(),
                    snapshot.upcoming.len(),
                    snapshot.finished.len()
                );
                self.events.emit(FeedEvent::RefreshCompleted {
                    source: acquired.source,
                    live: snapshot.live.len(),
                    upcoming: snapshot.upcoming.len(),
                    finished: snapshot.finished.len(),
                    elapsed_ms,
                });
                snapshot
            }
            Err(e) => {
                warn!("refresh failed, keeping previous snapshot: {e}");
                self.events.emit(FeedEvent::RefreshFailed {
                    reason: e.to_string(),
                    elapsed_ms,
                });
                self.current().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::orchestrator::Acquired;
    use crate::error::FeedResult;
    use crate::model::RawRecord;
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(Vec<serde_json::Value>);

    #[async_trait]
    impl MatchSource for Fixed {
        async fn fetch(&self) -> FeedResult<Acquired> {
            Ok(Acquired {
                source: StrategyKind::Mirror,
                records: self
                    .0
                    .iter()
                    .cloned()
                    .map(|v| RawRecord::new(StrategyKind::Mirror, v))
                    .collect(),
            })
        }
    }

    struct Panics;

    #[async_trait]
    impl MatchSource for Panics {
        async fn fetch(&self) -> FeedResult<Acquired> {
            panic!("boom")
        }
    }

    fn cache(source: Arc<dyn MatchSource>) -> CacheManager {
        CacheManager::new(source, Normalizer::new("https://m.test"), EventBus::default())
    }

    #[tokio::test]
    async fn test_empty_cache_refreshes_on_read() {
        let cache = cache(Arc::new(Fixed(vec![json!({"live": true, "id": "1"})])));
        assert!(cache.current().await.is_empty());

        let snap = cache.get_snapshot().await;
        assert_eq!(snap.live.len(), 1);

        let status = cache.status().await;
        assert_eq!(status.source, Some(StrategyKind::Mirror));
        assert!(status.last_updated.is_some());
        assert!(!status.refreshing);
    }

    #[tokio::test]
    async fn test_panicking_source_is_a_failed_refresh() {
        let cache = cache(Arc::new(Panics));
        let mut rx = cache.events.subscribe();
        let snap = cache.refresh().await;
        assert!(snap.is_empty());
        assert!(cache.status().await.last_updated.is_none());

        assert!(matches!(rx.recv().await.unwrap(), FeedEvent::RefreshStarted { .. }));
        assert!(matches!(rx.recv().await.unwrap(), FeedEvent::RefreshFailed { .. }));
    }

    #[tokio::test]
    async fn test_status_serializes_camel_case() {
        let cache = cache(Arc::new(Fixed(vec![])));
        let value = serde_json::to_value(cache.status().await).unwrap();
        assert!(value.get("lastUpdated").is_some());
        assert_eq!(value["refreshing"], false);
    }
}
