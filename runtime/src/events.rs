// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline event bus.
//!
//! A `tokio::sync::broadcast` channel carrying [`FeedEvent`] values from the
//! orchestrator, the challenge resolver and the cache. The REST layer streams
//! them as SSE. When no subscribers exist, events are silently dropped.

use crate::model::StrategyKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the pipeline emits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedEvent {
    // ── Refresh Events ────────────────────
    RefreshStarted { timestamp: String },
    RefreshCompleted {
        source: StrategyKind,
        live: usize,
        upcoming: usize,
        finished: usize,
        elapsed_ms: u64,
    },
    /// The previous snapshot was kept.
    RefreshFailed { reason: String, elapsed_ms: u64 },

    // ── Strategy Events ───────────────────
    StrategySucceeded { strategy: StrategyKind, records: usize },
    StrategyUnavailable { strategy: StrategyKind, reason: String },

    // ── Challenge Events ──────────────────
    /// An operator must resolve a bot challenge in the browser window.
    ChallengeDetected { url: String, timestamp: String },
    ChallengeResolved { timestamp: String },
}

impl FeedEvent {
    /// Coarse category used for SSE filtering.
    pub fn category(&self) -> &'static str {
        match self {
            Self::RefreshStarted { .. }
            | Self::RefreshCompleted { .. }
            | Self::RefreshFailed { .. } => "refresh",
            Self::StrategySucceeded { .. } | Self::StrategyUnavailable { .. } => "strategy",
            Self::ChallengeDetected { .. } | Self::ChallengeResolved { .. } => "challenge",
        }
    }
}

/// Shared event bus. Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: FeedEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// RFC 3339 timestamp for the current time.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = FeedEvent::StrategyUnavailable {
            strategy: StrategyKind::DirectApi,
            reason: "status 403".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"StrategyUnavailable""#));
        assert!(json.contains(r#""strategy":"direct-api""#));
    }

    #[test]
    fn test_event_bus_emit_no_subscribers() {
        let bus = EventBus::new(4);
        bus.emit(FeedEvent::RefreshStarted {
            timestamp: now_timestamp(),
        });
    }

    #[test]
    fn test_event_bus_subscribe_receive() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.clone().emit(FeedEvent::ChallengeResolved {
            timestamp: "t".to_string(),
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.category(), "challenge");
    }
}
