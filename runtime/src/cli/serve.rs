// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run the refresh loop and the read API until interrupted.

use super::{Pipeline, SignalMode};
use crate::config::Config;
use crate::refresher;
use crate::rest::{self, AppState};
use anyhow::Result;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// How long to wait for the refresh loop after the listener closes.
const REFRESHER_GRACE: Duration = Duration::from_secs(5);

pub async fn run(config: Config, host: IpAddr, port: Option<u16>) -> Result<()> {
    let mode = SignalMode::detect();
    let pipeline = Pipeline::build(&config, mode)?;

    info!("starting matchfeed v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "strategies: {}",
        pipeline
            .orchestrator
            .order()
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    if !config.browser_enabled {
        info!("browser scrape disabled");
    }
    if mode == SignalMode::Http {
        info!("challenges are resolved via POST /api/cs2/challenge/resolve");
    }

    let shutdown = Arc::new(Notify::new());
    let refresh_loop = refresher::spawn(
        pipeline.cache.clone(),
        config.refresh_interval,
        shutdown.clone(),
    );

    let state = Arc::new(AppState {
        cache: pipeline.cache,
        events: pipeline.events,
        resolver: pipeline.resolver,
        signal: pipeline.signal,
        refresh_interval: config.refresh_interval,
    });

    let stop = shutdown.clone();
    let on_signal = async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        stop.notify_one();
    };

    let addr = SocketAddr::new(host, port.unwrap_or(config.port));
    let served = rest::start(addr, state, on_signal).await;

    // A refresh blocked on a challenge keeps the loop busy; don't wait forever.
    if tokio::time::timeout(REFRESHER_GRACE, refresh_loop).await.is_err() {
        info!("refresh loop still busy at shutdown; abandoning it");
    }
    info!("matchfeed stopped");
    served
}
