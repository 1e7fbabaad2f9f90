// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Headless-browser capability abstraction.
//!
//! The browser scrape strategy only needs navigate, evaluate, cookie get/set
//! and close. [`BrowserLauncher`] starts one browser instance per scrape
//! attempt; the instance is released through [`Renderer::shutdown`].

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser cookie in an engine-neutral form.
///
/// This is also the on-disk shape of the persisted cookie set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry in seconds since the epoch; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

/// Starts browser instances.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a fresh browser instance.
    async fn launch(&self) -> Result<Box<dyn Renderer>>;
}

/// A running browser instance that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser instance and release its process.
    async fn shutdown(self: Box<Self>) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// All cookies visible to this context.
    async fn cookies(&self) -> Result<Vec<BrowserCookie>>;
    /// Install cookies into this context.
    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Launcher used when browser automation is disabled or unavailable.
pub struct NoopLauncher;

#[async_trait]
impl BrowserLauncher for NoopLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>> {
        Err(anyhow::anyhow!("browser automation not available"))
    }
}
