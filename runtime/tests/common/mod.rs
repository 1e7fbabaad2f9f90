// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scripted stand-ins for the browser shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use matchfeed_runtime::renderer::{
    BrowserCookie, BrowserLauncher, NavigationResult, RenderContext, Renderer,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake page shows and records.
#[derive(Default)]
pub struct PageScript {
    pub text: String,
    pub html: String,
    pub cookies: Vec<BrowserCookie>,
    pub local_storage: Value,
    pub panic_on_html: bool,
}

#[derive(Default)]
pub struct BrowserLog {
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub closed_contexts: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    pub restored_cookies: Mutex<Vec<BrowserCookie>>,
}

pub struct FakeLauncher {
    pub page: Arc<PageScript>,
    pub log: Arc<BrowserLog>,
    pub fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(page: PageScript) -> Arc<Self> {
        Arc::new(Self {
            page: Arc::new(page),
            log: Arc::new(BrowserLog::default()),
            fail_launch: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            page: Arc::new(PageScript::default()),
            log: Arc::new(BrowserLog::default()),
            fail_launch: true,
        })
    }

    pub fn launches(&self) -> usize {
        self.log.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.log.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            bail!("no browser in tests");
        }
        Ok(Box::new(FakeRenderer {
            page: self.page.clone(),
            log: self.log.clone(),
        }))
    }
}

struct FakeRenderer {
    page: Arc<PageScript>,
    log: Arc<BrowserLog>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(FakeContext {
            page: self.page.clone(),
            log: self.log.clone(),
            url: "about:blank".into(),
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<()> {
        self.log.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        0
    }
}

struct FakeContext {
    page: Arc<PageScript>,
    log: Arc<BrowserLog>,
    url: String,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<NavigationResult> {
        self.url = url.to_string();
        self.log.navigations.lock().unwrap().push(url.to_string());
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 5,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        if script.contains("innerText") {
            Ok(json!(self.page.text))
        } else if script.contains("localStorage.length") {
            Ok(json!({ "local": self.page.local_storage, "session": {} }))
        } else {
            Ok(Value::Null)
        }
    }

    async fn get_html(&self) -> Result<String> {
        if self.page.panic_on_html {
            panic!("renderer crashed");
        }
        Ok(self.page.html.clone())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>> {
        Ok(self.page.cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<()> {
        self.log
            .restored_cookies
            .lock()
            .unwrap()
            .extend_from_slice(cookies);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closed_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn cookie(name: &str, value: &str) -> BrowserCookie {
    BrowserCookie {
        name: name.into(),
        value: value.into(),
        domain: Some(".hltv.org".into()),
        path: Some("/".into()),
        expires: None,
        http_only: true,
        secure: true,
    }
}

pub const LISTING_HTML: &str = r#"<html><body>
  <div class="liveMatch-container">
    <a href="/matches/2370001/astralis-vs-natus-vincere">
      <div class="matchTeamName">Astralis</div>
      <div class="matchTeamName">NAVI</div>
      <div class="matchEventName">IEM Cologne</div>
    </a>
  </div>
  <div class="upcomingMatch">
    <a href="/matches/2370002/vitality-vs-faze">
      <div class="matchTime">18:00</div>
      <div class="matchTeamName">Vitality</div>
      <div class="matchTeamName">FaZe</div>
    </a>
  </div>
</body></html>"#;
