// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API.
//!
//! Thin layer over the scheduler and discovery. Job failures are data:
//! no handler turns an acquisition error into a 5xx.

use crate::acquisition::discovery::IdentifierFinder;
use crate::draw::Target;
use crate::events::{self, EventBus};
use crate::jobs::JobScheduler;
use crate::renderer::Renderer;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Everything the handlers share.
pub struct AppState {
    pub scheduler: JobScheduler,
    pub finder: IdentifierFinder,
    pub events: Arc<EventBus>,
    pub renderer: Arc<dyn Renderer>,
    pub started_at: Instant,
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/api/veikkaus/find", get(handle_find))
        .route("/api/veikkaus/kick", get(handle_kick))
        .route("/api/veikkaus/last", get(handle_last))
        .route("/api/veikkaus/events", get(events_sse))
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(addr: std::net::SocketAddr, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct TargetParams {
    kohde: Option<String>,
    force: Option<String>,
}

impl TargetParams {
    fn target(&self) -> Target {
        Target::parse(self.kohde.as_deref())
    }

    fn force(&self) -> bool {
        matches!(
            self.force.as_deref().map(str::trim),
            Some("1") | Some("true") | Some("yes")
        )
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn banner() -> &'static str {
    "Vakio scraper is running. Try /api/veikkaus/find or /api/veikkaus/last\n"
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "status": "ok",
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "timestamp": events::now_timestamp(),
        "activeSessions": state.renderer.active_contexts(),
        "runningJobs": state.scheduler.running_jobs(),
    }))
}

async fn handle_find(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let identifiers = state.finder.find().await;
    match identifiers.first() {
        Some(newest) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "kohde": newest,
                "identifiers": identifiers,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "ok": false,
                "error": "No open draw identifiers found",
            })),
        ),
    }
}

async fn handle_kick(
    Query(params): Query<TargetParams>,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    let target = params.target();
    let receipt = state.scheduler.kick(&target, params.force());
    let snapshot = state.scheduler.status(&target);

    Json(json!({
        "ok": true,
        "accepted": receipt.accepted,
        "alreadyRunning": receipt.already_running,
        "reusedCache": receipt.reused_cache,
        "message": receipt.message(),
        "mode": receipt.mode,
        "target": receipt.target,
        "kohde": snapshot.kohde,
        "inProgress": snapshot.in_progress,
        "runId": receipt.run_id,
    }))
}

async fn handle_last(
    Query(params): Query<TargetParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.scheduler.status(&params.target()))
}

/// Server-Sent Events endpoint for job lifecycle events.
///
/// Optionally filters by job key via `?kohde=a_100522` (or `auto`).
async fn events_sse(
    Query(params): Query<TargetParams>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    let key_filter = params.kohde.as_ref().map(|_| params.target().key().to_string());

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(ref key) = key_filter {
                        if !events::event_matches_key(&event, key) {
                            continue;
                        }
                    }
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kohde: Option<&str>, force: Option<&str>) -> TargetParams {
        TargetParams {
            kohde: kohde.map(String::from),
            force: force.map(String::from),
        }
    }

    #[test]
    fn test_force_flag_parsing() {
        assert!(params(None, Some("1")).force());
        assert!(params(None, Some("true")).force());
        assert!(!params(None, Some("0")).force());
        assert!(!params(None, None).force());
    }

    #[test]
    fn test_target_from_query() {
        assert_eq!(params(None, None).target(), Target::Auto);
        assert_eq!(params(Some("auto"), None).target(), Target::Auto);
        assert_eq!(
            params(Some("a_100522"), None).target(),
            Target::Draw("a_100522".to_string())
        );
    }
}
