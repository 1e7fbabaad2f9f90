// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the matchfeed binary.

pub mod doctor;
pub mod fetch_cmd;
pub mod serve;
pub mod session_cmd;

use crate::acquisition::orchestrator::FallbackOrchestrator;
use crate::cache::CacheManager;
use crate::challenge::{ChallengeResolver, ChannelSignal, HumanSignal, SignalHandle, TerminalSignal};
use crate::config::Config;
use crate::events::EventBus;
use crate::normalize::Normalizer;
use crate::renderer::chromium::ChromiumLauncher;
use anyhow::Result;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Bound applied to the challenge wait when nobody is at a terminal and
/// no explicit bound was configured.
pub const UNATTENDED_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Install the global tracing subscriber. `RUST_LOG` overrides the default.
pub fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "matchfeed=debug" } else { "matchfeed=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        eprintln!("tracing already initialised: {e}");
    }
}

/// How the operator answers a bot challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
    /// Enter on stdin.
    Terminal,
    /// `POST /api/cs2/challenge/resolve`.
    Http,
}

impl SignalMode {
    /// Terminal when stdin is interactive, HTTP otherwise.
    pub fn detect() -> Self {
        if std::io::stdin().is_terminal() {
            Self::Terminal
        } else {
            Self::Http
        }
    }
}

/// A fully wired acquisition pipeline.
pub struct Pipeline {
    pub cache: Arc<CacheManager>,
    pub orchestrator: Arc<FallbackOrchestrator>,
    pub resolver: Arc<ChallengeResolver>,
    pub signal: Option<SignalHandle>,
    pub events: EventBus,
}

impl Pipeline {
    pub fn build(config: &Config, mode: SignalMode) -> Result<Self> {
        let events = EventBus::default();

        let (signal, handle, timeout): (Arc<dyn HumanSignal>, Option<SignalHandle>, _) =
            match mode {
                SignalMode::Terminal => {
                    let signal: Arc<dyn HumanSignal> = Arc::new(TerminalSignal::new());
                    (signal, None, config.challenge_timeout)
                }
                SignalMode::Http => {
                    let (signal, handle) = ChannelSignal::pair();
                    let timeout = config.challenge_timeout.or_else(|| {
                        tracing::warn!(
                            "no terminal attached; bounding challenge waits to {}s",
                            UNATTENDED_CHALLENGE_TIMEOUT.as_secs()
                        );
                        Some(UNATTENDED_CHALLENGE_TIMEOUT)
                    });
                    let signal: Arc<dyn HumanSignal> = Arc::new(signal);
                    (signal, Some(handle), timeout)
                }
            };
        let resolver = Arc::new(ChallengeResolver::new(signal, timeout, events.clone()));

        if config.browser_enabled && config.headless {
            tracing::debug!("browser runs headless; challenges cannot be solved by hand");
        }
        let launcher = Arc::new(ChromiumLauncher::new(
            config.headless,
            config.chrome_path.clone(),
        ));

        let orchestrator = Arc::new(FallbackOrchestrator::from_config(
            config,
            launcher,
            resolver.clone(),
            events.clone(),
        )?);
        let cache = Arc::new(CacheManager::new(
            orchestrator.clone(),
            Normalizer::new(config.match_base_url.clone()),
            events.clone(),
        ));

        Ok(Self {
            cache,
            orchestrator,
            resolver,
            signal: handle,
            events,
        })
    }
}
