// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment-style configuration.
//!
//! Every option is optional. Unparseable numbers and booleans fall back to
//! their defaults with a warning; malformed URLs are rejected so they surface
//! at startup instead of inside the refresh loop.

use crate::error::{FeedError, FeedResult};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SOURCE_API_URL: &str = "https://www.hltv.org/api/matches";
pub const DEFAULT_SOURCE_PAGE_URL: &str = "https://www.hltv.org/matches";
pub const DEFAULT_MATCH_BASE_URL: &str = "https://www.hltv.org/matches";
pub const DEFAULT_MIRROR_URL: &str = "https://hltv-api.vercel.app/api/matches";
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 300_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_PORT: u16 = 3000;

/// Runtime configuration for the acquisition pipeline and the read API.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source data endpoint (JSON list).
    pub source_api_url: Url,
    /// Human-facing listing page, used for cookie harvesting and rendering.
    pub source_page_url: Url,
    /// Base for canonical match links, `{base}/{id}`.
    pub match_base_url: String,
    /// Third-party mirror endpoint (JSON list).
    pub mirror_url: Url,
    pub browser_enabled: bool,
    pub headless: bool,
    /// Browser executable override. Discovery is used when unset.
    pub chrome_path: Option<PathBuf>,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Bound on the human challenge wait. `None` waits indefinitely.
    pub challenge_timeout: Option<Duration>,
    /// Root for persisted session state and debug artifacts.
    pub data_dir: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_api_url: parse_default(DEFAULT_SOURCE_API_URL),
            source_page_url: parse_default(DEFAULT_SOURCE_PAGE_URL),
            match_base_url: DEFAULT_MATCH_BASE_URL.to_string(),
            mirror_url: parse_default(DEFAULT_MIRROR_URL),
            browser_enabled: true,
            headless: true,
            chrome_path: None,
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            navigation_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            challenge_timeout: None,
            data_dir: default_data_dir(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> FeedResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> FeedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let match_base_url = match get("MATCHFEED_MATCH_BASE_URL") {
            Some(raw) => {
                parse_url("MATCHFEED_MATCH_BASE_URL", &raw)?;
                raw
            }
            None => defaults.match_base_url,
        };

        let refresh_ms = u64_or(
            get("MATCHFEED_REFRESH_INTERVAL_MS"),
            "MATCHFEED_REFRESH_INTERVAL_MS",
            DEFAULT_REFRESH_INTERVAL_MS,
        );
        let request_ms = u64_or(
            get("MATCHFEED_REQUEST_TIMEOUT_MS"),
            "MATCHFEED_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        );
        let nav_ms = u64_or(
            get("MATCHFEED_NAV_TIMEOUT_MS"),
            "MATCHFEED_NAV_TIMEOUT_MS",
            DEFAULT_NAV_TIMEOUT_MS,
        );
        let challenge_ms = u64_or(
            get("MATCHFEED_CHALLENGE_TIMEOUT_MS"),
            "MATCHFEED_CHALLENGE_TIMEOUT_MS",
            0,
        );
        let port = u64_or(get("MATCHFEED_PORT"), "MATCHFEED_PORT", DEFAULT_PORT as u64);

        Ok(Self {
            source_api_url: url_or(
                get("MATCHFEED_SOURCE_API_URL"),
                "MATCHFEED_SOURCE_API_URL",
                defaults.source_api_url,
            )?,
            source_page_url: url_or(
                get("MATCHFEED_SOURCE_PAGE_URL"),
                "MATCHFEED_SOURCE_PAGE_URL",
                defaults.source_page_url,
            )?,
            match_base_url: match_base_url.trim_end_matches('/').to_string(),
            mirror_url: url_or(
                get("MATCHFEED_MIRROR_URL"),
                "MATCHFEED_MIRROR_URL",
                defaults.mirror_url,
            )?,
            browser_enabled: bool_or(
                get("MATCHFEED_BROWSER_ENABLED"),
                "MATCHFEED_BROWSER_ENABLED",
                true,
            ),
            headless: bool_or(get("MATCHFEED_HEADLESS"), "MATCHFEED_HEADLESS", true),
            chrome_path: get("MATCHFEED_CHROME_PATH").map(PathBuf::from),
            refresh_interval: Duration::from_millis(refresh_ms.max(1_000)),
            request_timeout: Duration::from_millis(request_ms),
            navigation_timeout: Duration::from_millis(nav_ms),
            challenge_timeout: (challenge_ms > 0).then(|| Duration::from_millis(challenge_ms)),
            data_dir: get("MATCHFEED_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            port: u16::try_from(port).unwrap_or(DEFAULT_PORT),
        })
    }

    /// Directory holding the persisted browser session.
    pub fn session_dir(&self) -> PathBuf {
        self.data_dir.join("session")
    }

    /// Directory for best-effort scrape artifacts.
    pub fn debug_dir(&self) -> PathBuf {
        self.data_dir.join("debug")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".matchfeed")
}

fn parse_default(raw: &str) -> Url {
    // Compile-time constants; a failure here is a programming error caught by tests.
    Url::parse(raw).unwrap_or_else(|e| panic!("invalid built-in URL {raw}: {e}"))
}

fn parse_url(key: &str, raw: &str) -> FeedResult<Url> {
    let url = Url::parse(raw).map_err(|e| FeedError::Config(format!("{key}={raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FeedError::Config(format!(
            "{key}={raw:?}: unsupported scheme {other:?}"
        ))),
    }
}

fn url_or(raw: Option<String>, key: &str, default: Url) -> FeedResult<Url> {
    match raw {
        Some(raw) => parse_url(key, &raw),
        None => Ok(default),
    }
}

fn bool_or(raw: Option<String>, key: &str, default: bool) -> bool {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => default,
        Some("true" | "1" | "yes" | "on") => true,
        Some("false" | "0" | "no" | "off") => false,
        Some(other) => {
            tracing::warn!("ignoring {key}={other:?}: expected a boolean, using {default}");
            default
        }
    }
}

fn u64_or(raw: Option<String>, key: &str, default: u64) -> u64 {
    match raw {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring {key}={v:?}: expected an integer, using {default}");
            default
        }),
    }
}
