// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bot-challenge detection and the human hand-off.
//!
//! The resolver never tries to solve a challenge. It flips to
//! [`ResolverState::AwaitingHuman`], blocks until an operator signals that the
//! challenge was solved in the browser window, lets the session settle, and
//! returns. This is the only interactive step in the system and must only run
//! where an operator is present; an optional timeout turns an unattended wait
//! into [`FeedError::ChallengeUnresolved`].

use crate::error::{FeedError, FeedResult};
use crate::events::{now_timestamp, EventBus, FeedEvent};
use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::io::BufRead;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

/// How much rendered page text is inspected for challenge phrases.
pub const CHALLENGE_PROBE_CHARS: usize = 2000;

/// Pause after the operator signal so the fresh session can stabilize.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

fn challenge_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)checking your browser|just a moment|please enable javascript")
            .unwrap_or_else(|e| panic!("invalid challenge pattern: {e}"))
    })
}

/// Whether the leading page text looks like an interactive bot challenge.
pub fn detect_challenge(page_text: &str) -> bool {
    let probe: String = page_text.chars().take(CHALLENGE_PROBE_CHARS).collect();
    challenge_pattern().is_match(&probe)
}

/// Resolver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverState {
    Normal,
    AwaitingHuman,
}

/// Source of the operator's "challenge solved" signal.
#[async_trait]
pub trait HumanSignal: Send + Sync {
    /// Block until the operator signals.
    async fn wait(&self) -> Result<()>;
    /// Instruction printed when the wait begins.
    fn prompt(&self) -> &'static str;
    /// Discard any signal delivered before the challenge was announced.
    fn arm(&self) {}
}

/// Waits for Enter on the controlling terminal.
///
/// A dedicated thread owns stdin for the life of the signal and forwards each
/// line as a trigger, so Enter pressed while no challenge is pending is
/// buffered here and discarded by [`HumanSignal::arm`].
pub struct TerminalSignal {
    lines: ChannelSignal,
}

impl TerminalSignal {
    pub fn new() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Read operator lines from `reader` instead of stdin.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (lines, handle) = ChannelSignal::pair();
        let spawned = std::thread::Builder::new()
            .name("matchfeed-operator".into())
            .spawn(move || {
                for line in reader.lines() {
                    if line.is_err() {
                        break;
                    }
                    handle.notify();
                }
            });
        if let Err(e) = spawned {
            warn!("could not read operator input: {e}");
        }
        Self { lines }
    }
}

impl Default for TerminalSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanSignal for TerminalSignal {
    async fn wait(&self) -> Result<()> {
        self.lines
            .wait()
            .await
            .map_err(|_| anyhow::anyhow!("stdin closed while waiting for the operator"))
    }

    fn prompt(&self) -> &'static str {
        "press Enter in this terminal to save the session and continue"
    }

    fn arm(&self) {
        self.lines.arm();
    }
}

/// Waits for an out-of-band trigger delivered through a [`SignalHandle`].
pub struct ChannelSignal {
    rx: Mutex<mpsc::Receiver<()>>,
}

/// Sender half of a [`ChannelSignal`].
#[derive(Clone)]
pub struct SignalHandle {
    tx: mpsc::Sender<()>,
}

impl SignalHandle {
    /// Deliver the signal. Returns false if one is already pending.
    pub fn notify(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

impl ChannelSignal {
    pub fn pair() -> (Self, SignalHandle) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self { rx: Mutex::new(rx) },
            SignalHandle { tx },
        )
    }
}

#[async_trait]
impl HumanSignal for ChannelSignal {
    async fn wait(&self) -> Result<()> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(()) => Ok(()),
            None => bail!("challenge signal channel closed"),
        }
    }

    fn prompt(&self) -> &'static str {
        "POST /api/cs2/challenge/resolve to save the session and continue"
    }

    fn arm(&self) {
        if let Ok(mut rx) = self.rx.try_lock() {
            while rx.try_recv().is_ok() {}
        }
    }
}

/// Two-state machine handing control to a human on challenge detection.
pub struct ChallengeResolver {
    signal: Arc<dyn HumanSignal>,
    settle: Duration,
    timeout: Option<Duration>,
    state: watch::Sender<ResolverState>,
    events: EventBus,
}

impl ChallengeResolver {
    pub fn new(signal: Arc<dyn HumanSignal>, timeout: Option<Duration>, events: EventBus) -> Self {
        let (state, _) = watch::channel(ResolverState::Normal);
        Self {
            signal,
            settle: DEFAULT_SETTLE_DELAY,
            timeout,
            state,
            events,
        }
    }

    /// Override the post-signal settle delay.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn state(&self) -> ResolverState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ResolverState> {
        self.state.subscribe()
    }

    /// Suspend until the operator resolves the challenge shown at `url`.
    pub async fn resolve(&self, url: &str) -> FeedResult<()> {
        self.signal.arm();
        self.state.send_replace(ResolverState::AwaitingHuman);
        self.events.emit(FeedEvent::ChallengeDetected {
            url: url.to_string(),
            timestamp: now_timestamp(),
        });
        warn!(
            "bot challenge detected at {url}; solve it in the browser window, then {}",
            self.signal.prompt()
        );

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.signal.wait()).await {
                Ok(waited) => waited,
                Err(_) => Err(anyhow::anyhow!(
                    "no operator signal within {}s",
                    limit.as_secs()
                )),
            },
            None => self.signal.wait().await,
        };
        self.state.send_replace(ResolverState::Normal);

        if let Err(e) = outcome {
            warn!("challenge left unresolved: {e:#}");
            return Err(FeedError::ChallengeUnresolved(format!("{e:#}")));
        }

        info!("operator signalled; letting the session settle");
        tokio::time::sleep(self.settle).await;
        self.events.emit(FeedEvent::ChallengeResolved {
            timestamp: now_timestamp(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_known_phrases_case_insensitive() {
        assert!(detect_challenge("Just a moment..."));
        assert!(detect_challenge("CHECKING YOUR BROWSER before accessing"));
        assert!(detect_challenge("Please enable JavaScript and cookies"));
        assert!(!detect_challenge("Upcoming CS2 matches"));
    }

    #[test]
    fn test_only_prefix_is_probed() {
        let text = format!("{}just a moment", "x".repeat(CHALLENGE_PROBE_CHARS));
        assert!(!detect_challenge(&text));
    }

    #[tokio::test]
    async fn test_resolve_waits_for_signal() {
        let (signal, handle) = ChannelSignal::pair();
        let resolver = Arc::new(
            ChallengeResolver::new(Arc::new(signal), None, EventBus::default())
                .with_settle_delay(Duration::ZERO),
        );
        let mut states = resolver.subscribe();

        let task = tokio::spawn({
            let resolver = Arc::clone(&resolver);
            async move { resolver.resolve("https://example.org/matches").await }
        });

        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), ResolverState::AwaitingHuman);
        assert!(!task.is_finished());

        assert!(handle.notify());
        task.await.unwrap().unwrap();
        assert_eq!(resolver.state(), ResolverState::Normal);
    }

    #[tokio::test]
    async fn test_stale_signal_is_discarded() {
        let (signal, handle) = ChannelSignal::pair();
        assert!(handle.notify());
        let resolver = ChallengeResolver::new(
            Arc::new(signal),
            Some(Duration::from_millis(50)),
            EventBus::default(),
        );
        let err = resolver.resolve("https://example.org").await.unwrap_err();
        assert!(matches!(err, FeedError::ChallengeUnresolved(_)));
    }

    /// Blocking reader fed line by line from the test body.
    struct FedLines(std::sync::mpsc::Receiver<&'static [u8]>);

    impl std::io::Read for FedLines {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(bytes);
                    Ok(bytes.len())
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[tokio::test]
    async fn test_terminal_enter_before_challenge_is_discarded() {
        let (tx, rx) = std::sync::mpsc::channel();
        let signal = TerminalSignal::from_reader(std::io::BufReader::new(FedLines(rx)));

        tx.send(&b"\n"[..]).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        signal.arm();
        let early = tokio::time::timeout(Duration::from_millis(200), signal.wait()).await;
        assert!(early.is_err(), "stale Enter resolved the challenge");

        tx.send(&b"\n"[..]).unwrap();
        tokio::time::timeout(Duration::from_secs(2), signal.wait())
            .await
            .unwrap()
            .unwrap();

        drop(tx);
        let closed = tokio::time::timeout(Duration::from_secs(2), signal.wait())
            .await
            .unwrap();
        assert!(closed.unwrap_err().to_string().contains("stdin closed"));
    }

    #[tokio::test]
    async fn test_timeout_returns_to_normal() {
        let (signal, _handle) = ChannelSignal::pair();
        let resolver = ChallengeResolver::new(
            Arc::new(signal),
            Some(Duration::from_millis(20)),
            EventBus::default(),
        );
        assert!(resolver.resolve("https://example.org").await.is_err());
        assert_eq!(resolver.state(), ResolverState::Normal);
    }
}
