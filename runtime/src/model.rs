// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data model: raw records, canonical matches, and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which acquisition strategy produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    DirectApi,
    Mirror,
    BrowserScrape,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectApi => "direct-api",
            Self::Mirror => "mirror",
            Self::BrowserScrape => "browser-scrape",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unnormalized match data as one strategy produced it.
///
/// The field bag has no guaranteed shape. Only the normalizer interprets it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub source: StrategyKind,
    pub fields: Value,
}

impl RawRecord {
    pub fn new(source: StrategyKind, fields: Value) -> Self {
        Self { source, fields }
    }
}

/// Canonical three-way match classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Live,
    Upcoming,
    Finished,
}

impl MatchStatus {
    /// Parse an explicit status label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "live" => Some(Self::Live),
            "upcoming" | "scheduled" => Some(Self::Upcoming),
            "finished" | "over" | "ended" | "completed" => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Upcoming => "upcoming",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A match start time as the source reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchTime {
    /// Milliseconds since the Unix epoch.
    Epoch(i64),
    /// Free-form text, e.g. an RFC 3339 date or a rendered "14:30".
    Text(String),
}

impl MatchTime {
    /// The absolute instant, when the value can be interpreted as one.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(ms) => DateTime::from_timestamp_millis(*ms),
            Self::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Sentinel for an unresolvable team name.
pub const TBD: &str = "TBD";

/// Normalized, schema-stable match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMatch {
    pub id: Option<String>,
    pub team1: String,
    pub team2: String,
    pub event: Option<String>,
    pub time: Option<MatchTime>,
    pub status: MatchStatus,
    pub link: Option<String>,
    pub score: Option<Value>,
    /// The record this match was built from, kept for diagnostics.
    pub raw: Value,
}

/// Three-way partitioned result of one normalization pass. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub live: Vec<CanonicalMatch>,
    pub upcoming: Vec<CanonicalMatch>,
    pub finished: Vec<CanonicalMatch>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            live: Vec::new(),
            upcoming: Vec::new(),
            finished: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// True when all three partitions are empty.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.upcoming.is_empty() && self.finished.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len() + self.upcoming.len() + self.finished.len()
    }

    pub fn partition(&self, status: MatchStatus) -> &[CanonicalMatch] {
        match status {
            MatchStatus::Live => &self.live,
            MatchStatus::Upcoming => &self.upcoming,
            MatchStatus::Finished => &self.finished,
        }
    }
}
