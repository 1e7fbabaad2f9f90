// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Background refresh loop.
//!
//! Ticks immediately on start, then every `interval`. A tick that lands
//! while a refresh is still running is skipped rather than queued.

use crate::cache::CacheManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

/// Spawn the refresh loop until `shutdown` is notified.
pub fn spawn(
    cache: Arc<CacheManager>,
    interval: Duration,
    shutdown: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("refresh loop started: interval={}s", interval.as_secs());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("refresh loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if cache.refresh_if_idle().await.is_none() {
                        tracing::debug!("refresh tick skipped");
                    }
                }
            }
        }
    })
}
