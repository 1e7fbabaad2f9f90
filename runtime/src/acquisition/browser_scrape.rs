// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session-aware browser scrape, the last and most expensive strategy.
//!
//! One browser instance per attempt. The saved session is restored before
//! navigation so a previously solved challenge can be skipped; when a
//! challenge does appear the [`ChallengeResolver`] hands control to an
//! operator. The session is persisted after every pass through the page, and
//! the browser is shut down on every exit path, panics included.

use super::{tag_records, Strategy};
use crate::challenge::{detect_challenge, ChallengeResolver};
use crate::error::{panic_message, FeedError, FeedResult};
use crate::model::{RawRecord, StrategyKind};
use crate::renderer::{BrowserLauncher, RenderContext, Renderer};
use crate::session::SessionStore;
use async_trait::async_trait;
use futures::FutureExt;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const KIND: StrategyKind = StrategyKind::BrowserScrape;

/// Pause between page load and DOM extraction.
const POST_LOAD_SETTLE: Duration = Duration::from_secs(1);

/// One match entry as it appeared in the rendered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedMatch {
    pub teams: Vec<String>,
    pub time: String,
    pub event: String,
    pub link: String,
    pub live: bool,
}

impl ScrapedMatch {
    /// Last non-empty path segment of the match link.
    pub fn link_id(&self) -> Option<String> {
        let url = Url::parse(&self.link).ok()?;
        url.path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string)
    }

    /// Raw record fields for the normalizer.
    pub fn into_fields(self) -> Value {
        let mut fields = Map::new();
        if let Some(id) = self.link_id() {
            fields.insert("id".into(), json!(id));
        }
        if let Some(team) = self.teams.first() {
            fields.insert("team1".into(), json!(team));
        }
        if let Some(team) = self.teams.get(1) {
            fields.insert("team2".into(), json!(team));
        }
        if !self.event.is_empty() {
            fields.insert("event".into(), json!(self.event));
        }
        if !self.time.is_empty() {
            fields.insert("time".into(), json!(self.time));
        }
        if !self.link.is_empty() {
            fields.insert("link".into(), json!(self.link));
        }
        fields.insert("live".into(), json!(self.live));
        Value::Object(fields)
    }
}

struct MatchSelectors {
    container: Selector,
    team: Selector,
    time: Selector,
    event: Selector,
    link: Selector,
    score: Selector,
}

fn selectors() -> &'static MatchSelectors {
    static SELECTORS: OnceLock<MatchSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let sel = |css: &str| {
            Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
        };
        MatchSelectors {
            container: sel(".upcomingMatch, .liveMatch-container, .match"),
            team: sel(".matchTeamName"),
            time: sel(".matchTime"),
            event: sel(".matchEventName"),
            link: sel(r#"a[href*="/matches/"]"#),
            score: sel(".matchTeamScore"),
        }
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(el: ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).next().map(element_text).unwrap_or_default()
}

fn match_link(el: ElementRef<'_>, sel: &Selector, base: &Url) -> String {
    let own = el
        .value()
        .attr("href")
        .filter(|href| href.contains("/matches/"));
    let href = own.or_else(|| el.select(sel).find_map(|a| a.value().attr("href")));
    href.and_then(|h| base.join(h).ok())
        .map(|u| u.to_string())
        .unwrap_or_default()
}

/// Extract match entries from rendered listing HTML.
///
/// Relative links resolve against `base`.
pub fn extract_matches(html: &str, base: &Url) -> Vec<ScrapedMatch> {
    let doc = Html::parse_document(html);
    let s = selectors();

    doc.select(&s.container)
        .map(|m| {
            let teams: Vec<String> = m
                .select(&s.team)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            let live = m.select(&s.score).next().is_some()
                || m.value().classes().any(|c| c == "liveMatch-container");
            ScrapedMatch {
                teams,
                time: first_text(m, &s.time),
                event: first_text(m, &s.event),
                link: match_link(m, &s.link, base),
                live,
            }
        })
        .collect()
}

/// Best-effort dump of a raw extraction; failures are logged and ignored.
pub fn write_artifact(dir: &std::path::Path, scraped: &[ScrapedMatch]) -> Option<PathBuf> {
    let path = dir.join(format!(
        "scraped-{}.json",
        chrono::Utc::now().timestamp_millis()
    ));
    let written = std::fs::create_dir_all(dir)
        .and_then(|()| {
            serde_json::to_vec_pretty(scraped)
                .map_err(std::io::Error::other)
        })
        .and_then(|json| std::fs::write(&path, json));
    match written {
        Ok(()) => {
            info!("raw scrape saved to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("could not write scrape artifact: {e}");
            None
        }
    }
}

const PAGE_TEXT_JS: &str =
    "document.documentElement ? document.documentElement.innerText.slice(0, 2000) : ''";

pub struct BrowserScrape {
    enabled: bool,
    launcher: Arc<dyn BrowserLauncher>,
    sessions: SessionStore,
    resolver: Arc<ChallengeResolver>,
    page_url: Url,
    navigation_timeout: Duration,
    settle: Duration,
    artifact_dir: Option<PathBuf>,
}

impl BrowserScrape {
    pub fn new(
        enabled: bool,
        launcher: Arc<dyn BrowserLauncher>,
        sessions: SessionStore,
        resolver: Arc<ChallengeResolver>,
        page_url: Url,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            enabled,
            launcher,
            sessions,
            resolver,
            page_url,
            navigation_timeout,
            settle: POST_LOAD_SETTLE,
            artifact_dir: None,
        }
    }

    /// Write each raw extraction into `dir`.
    pub fn with_artifact_dir(mut self, dir: PathBuf) -> Self {
        self.artifact_dir = Some(dir);
        self
    }

    /// Override the pause between page load and extraction.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn scrape(&self, renderer: &dyn Renderer) -> FeedResult<Vec<RawRecord>> {
        let mut ctx = renderer
            .new_context()
            .await
            .map_err(|e| FeedError::unavailable(KIND, format!("{e:#}")))?;
        let result = self.scrape_page(ctx.as_mut()).await;
        if let Err(e) = ctx.close().await {
            debug!("failed to close browser context: {e:#}");
        }
        result
    }

    async fn scrape_page(&self, ctx: &mut dyn RenderContext) -> FeedResult<Vec<RawRecord>> {
        let session = self.sessions.restore_cookies(ctx).await;

        match ctx
            .navigate(self.page_url.as_str(), self.navigation_timeout)
            .await
        {
            Ok(nav) => info!("listing page loaded in {}ms", nav.load_time_ms),
            Err(e) => warn!("navigation did not complete ({e:#}); continuing"),
        }
        self.sessions.restore_storage(ctx, &session).await;

        let text = ctx
            .execute_js(PAGE_TEXT_JS)
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        if detect_challenge(&text) {
            self.resolver
                .resolve(self.page_url.as_str())
                .await
                .map_err(|e| FeedError::unavailable(KIND, e.to_string()))?;
        }
        self.sessions.persist(ctx).await;

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let html = ctx
            .get_html()
            .await
            .map_err(|e| FeedError::unavailable(KIND, format!("{e:#}")))?;
        let base = ctx
            .get_url()
            .await
            .ok()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| self.page_url.clone());

        let scraped = extract_matches(&html, &base);
        info!("extracted {} match entries from rendered page", scraped.len());
        if let Some(dir) = &self.artifact_dir {
            write_artifact(dir, &scraped);
        }

        let items = scraped.into_iter().map(ScrapedMatch::into_fields).collect();
        Ok(tag_records(KIND, items))
    }
}

#[async_trait]
impl Strategy for BrowserScrape {
    fn kind(&self) -> StrategyKind {
        KIND
    }

    async fn attempt(&self) -> FeedResult<Vec<RawRecord>> {
        if !self.enabled {
            return Err(FeedError::unavailable(KIND, "browser automation disabled"));
        }

        info!("browser scrape: launching browser");
        let renderer = self
            .launcher
            .launch()
            .await
            .map_err(|e| FeedError::unavailable(KIND, format!("{e:#}")))?;

        let outcome = AssertUnwindSafe(self.scrape(renderer.as_ref()))
            .catch_unwind()
            .await;

        if let Err(e) = renderer.shutdown().await {
            warn!("failed to shut down browser: {e:#}");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => Err(FeedError::unavailable(
                KIND,
                format!("scrape panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div class="liveMatch-container">
            <a href="/matches/2370001/astralis-vs-natus-vincere">
              <div class="matchTeamName">Astralis</div>
              <div class="matchTeamName">NAVI</div>
              <div class="matchEventName">IEM Cologne</div>
            </a>
          </div>
          <div class="upcomingMatch">
            <a href="https://www.hltv.org/matches/2370002/vitality-vs-faze">
              <div class="matchTime">18:00</div>
              <div class="matchTeamName"> Team   Vitality </div>
              <div class="matchTeamName">FaZe</div>
            </a>
          </div>
          <div class="upcomingMatch">
            <div class="matchTeamName">Only One</div>
            <span class="matchTeamScore">1</span>
          </div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://www.hltv.org/matches").unwrap()
    }

    #[test]
    fn test_extract_matches() {
        let scraped = extract_matches(LISTING, &base());
        assert_eq!(scraped.len(), 3);

        assert!(scraped[0].live);
        assert_eq!(scraped[0].teams, vec!["Astralis", "NAVI"]);
        assert_eq!(scraped[0].event, "IEM Cologne");
        assert_eq!(
            scraped[0].link,
            "https://www.hltv.org/matches/2370001/astralis-vs-natus-vincere"
        );

        assert!(!scraped[1].live);
        assert_eq!(scraped[1].teams[0], "Team Vitality");
        assert_eq!(scraped[1].time, "18:00");

        assert!(scraped[2].live, "score presence marks the entry live");
        assert_eq!(scraped[2].link, "");
    }

    #[test]
    fn test_link_id_is_last_segment() {
        let m = ScrapedMatch {
            teams: vec![],
            time: String::new(),
            event: String::new(),
            link: "https://www.hltv.org/matches/2370002/vitality-vs-faze/".into(),
            live: false,
        };
        assert_eq!(m.link_id().as_deref(), Some("vitality-vs-faze"));
    }

    #[test]
    fn test_into_fields_omits_empty_values() {
        let scraped = extract_matches(LISTING, &base());
        let fields = scraped[2].clone().into_fields();
        assert_eq!(fields["team1"], "Only One");
        assert!(fields.get("team2").is_none());
        assert!(fields.get("id").is_none());
        assert!(fields.get("event").is_none());
        assert_eq!(fields["live"], true);
    }

    #[test]
    fn test_write_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let scraped = extract_matches(LISTING, &base());
        let path = write_artifact(&dir.path().join("debug"), &scraped).unwrap();
        let saved: Vec<ScrapedMatch> =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(saved, scraped);
    }

    #[test]
    fn test_write_artifact_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(write_artifact(&blocker.join("debug"), &[]).is_none());
    }
}
