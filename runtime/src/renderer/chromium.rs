// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{BrowserCookie, BrowserLauncher, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam, TimeSinceEpoch};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Desktop user agent presented by every browser context.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/120.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ~/.matchfeed/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".matchfeed/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".matchfeed/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".matchfeed/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".matchfeed/chromium/chrome-linux64/chrome"),
                home.join(".matchfeed/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Resolve the executable to launch: an explicit override wins over discovery.
pub fn resolve_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => bail!("configured browser executable not found: {}", path.display()),
        None => find_chromium().context("Chromium not found; set MATCHFEED_CHROME_PATH"),
    }
}

/// Launches one Chromium process per scrape attempt.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    pub fn new(headless: bool, executable: Option<PathBuf>) -> Self {
        Self {
            headless,
            executable,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>> {
        let chrome_path = resolve_executable(self.executable.as_deref())?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // The CDP handler must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Box::new(ChromiumRenderer {
            browser,
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        }))
    }
}

/// A running Chromium instance.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(USER_AGENT)
            .accept_language(ACCEPT_LANGUAGE)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build user agent override: {e}"))?;
        page.execute(identity)
            .await
            .context("failed to set user agent")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<()> {
        let ChromiumRenderer {
            mut browser,
            handler,
            ..
        } = *self;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler.abort();
        closed.map(|_| ()).context("failed to close Chromium")
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .context("failed to read cookies")?;
        Ok(cookies.into_iter().map(from_cdp_cookie).collect())
    }

    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let params: Vec<CookieParam> = cookies.iter().map(to_cdp_cookie).collect();
        self.page
            .set_cookies(params)
            .await
            .context("failed to set cookies")?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

fn from_cdp_cookie(c: Cookie) -> BrowserCookie {
    let expires = (!c.session && c.expires >= 0.0).then_some(c.expires);
    BrowserCookie {
        name: c.name,
        value: c.value,
        domain: Some(c.domain),
        path: Some(c.path),
        expires,
        http_only: c.http_only,
        secure: c.secure,
    }
}

fn to_cdp_cookie(c: &BrowserCookie) -> CookieParam {
    let mut param = CookieParam::new(c.name.clone(), c.value.clone());
    param.domain = c.domain.clone();
    param.path = c.path.clone();
    param.secure = Some(c.secure);
    param.http_only = Some(c.http_only);
    param.expires = c.expires.map(TimeSinceEpoch::new);
    param
}
