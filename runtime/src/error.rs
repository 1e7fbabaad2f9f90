// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the acquisition pipeline.
//!
//! None of these are fatal at runtime: strategies report
//! [`FeedError::StrategyUnavailable`] to trigger the next fallback, the
//! normalizer skips [`FeedError::MalformedRecord`] entries, and the cache keeps
//! its previous snapshot on [`FeedError::RefreshFailed`]. Only
//! [`FeedError::Config`] is allowed to surface, and only at startup.

use crate::model::StrategyKind;
use std::path::PathBuf;

/// All errors produced by the matchfeed core.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("{strategy} unavailable: {reason}")]
    StrategyUnavailable {
        strategy: StrategyKind,
        reason: String,
    },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("session I/O error at {}: {source}", path.display())]
    SessionIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session file {} is not valid JSON: {source}", path.display())]
    SessionFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("refresh failed: {0}")]
    RefreshFailed(String),

    #[error("challenge unresolved: {0}")]
    ChallengeUnresolved(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FeedError {
    /// Shorthand for a strategy reporting not-applicable.
    pub fn unavailable(strategy: StrategyKind, reason: impl Into<String>) -> Self {
        Self::StrategyUnavailable {
            strategy,
            reason: reason.into(),
        }
    }
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
