// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP read API.
//!
//! Serves the cached snapshot, forces refreshes, relays the operator's
//! challenge signal and streams pipeline events as SSE. Handlers only read
//! the cache; a refresh blocked on a challenge never stalls them, except
//! for routes that must refresh an empty cache first.

use crate::cache::CacheManager;
use crate::challenge::{ChallengeResolver, ResolverState, SignalHandle};
use crate::events::EventBus;
use crate::model::{CanonicalMatch, MatchStatus};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Everything the handlers share.
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub events: EventBus,
    pub resolver: Arc<ChallengeResolver>,
    /// Present when challenges are resolved over HTTP instead of the terminal.
    pub signal: Option<SignalHandle>,
    pub refresh_interval: Duration,
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(service_info))
        .route("/ping", get(ping))
        .route("/api/cs2/all", get(all_matches))
        .route("/api/cs2/live", get(live_matches))
        .route("/api/cs2/upcoming", get(upcoming_matches))
        .route("/api/cs2/results", get(finished_matches))
        .route("/api/cs2/refresh", get(force_refresh))
        .route("/api/cs2/challenge", get(challenge_state))
        .route("/api/cs2/challenge/resolve", post(resolve_challenge))
        .route("/api/cs2/events", get(events_sse))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` completes.
pub async fn start(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("read API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

// ── Handlers ────────────────────────────────────────────────────

async fn service_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.cache.status().await;
    Json(json!({
        "service": "matchfeed CS2 match API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "all": "/api/cs2/all",
            "live": "/api/cs2/live",
            "upcoming": "/api/cs2/upcoming",
            "results": "/api/cs2/results",
            "refresh": "/api/cs2/refresh",
            "events": "/api/cs2/events",
            "challenge": "/api/cs2/challenge",
        },
        "cache": {
            "lastUpdated": status.last_updated.map(|t| t.to_rfc3339()),
            "intervalMs": state.refresh_interval.as_millis() as u64,
            "source": status.source,
            "refreshing": status.refreshing,
        }
    }))
}

async fn ping() -> &'static str {
    "pong"
}

async fn all_matches(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.cache.get_snapshot().await;
    Json(json!({
        "updated": now(),
        "live": snapshot.live,
        "upcoming": snapshot.upcoming,
        "finished": snapshot.finished,
    }))
}

fn partition_body(matches: Vec<CanonicalMatch>) -> Json<Value> {
    Json(json!({
        "updated": now(),
        "count": matches.len(),
        "matches": matches,
    }))
}

async fn live_matches(State(state): State<Arc<AppState>>) -> Json<Value> {
    partition_body(state.cache.get_partition(MatchStatus::Live).await)
}

async fn upcoming_matches(State(state): State<Arc<AppState>>) -> Json<Value> {
    partition_body(state.cache.get_partition(MatchStatus::Upcoming).await)
}

async fn finished_matches(State(state): State<Arc<AppState>>) -> Json<Value> {
    partition_body(state.cache.get_partition(MatchStatus::Finished).await)
}

async fn force_refresh(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.cache.refresh().await;
    Json(json!({
        "ok": true,
        "updated": now(),
        "count": snapshot.len(),
    }))
}

async fn challenge_state(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "state": state.resolver.state(),
        "signal": if state.signal.is_some() { "http" } else { "terminal" },
    }))
}

/// Relay the operator's "challenge solved" signal to the waiting scrape.
async fn resolve_challenge(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(signal) = &state.signal else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "challenges are resolved on the server terminal" })),
        );
    };
    if state.resolver.state() != ResolverState::AwaitingHuman {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "no challenge is awaiting resolution" })),
        );
    }
    let delivered = signal.notify();
    (
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "alreadyPending": !delivered })),
    )
}

/// SSE query parameters.
#[derive(serde::Deserialize, Default)]
struct EventsParams {
    category: Option<String>,
}

/// Server-Sent Events endpoint for pipeline events.
///
/// Optionally filters by category via `?category=refresh|strategy|challenge`.
async fn events_sse(
    Query(params): Query<EventsParams>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    let category = params.category;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(ref wanted) = category {
                        if event.category() != wanted.as_str() {
                            continue;
                        }
                    }
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().event(event.category()).data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "route not found" })),
    )
}
