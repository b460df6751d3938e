//! End-to-end service tests: scheduler, browser runner and REST router
//! over a recorded fixture instead of a live browser.

use assert_json_diff::assert_json_include;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use vakio_runtime::cli::build_services;
use vakio_runtime::config::{RuntimeConfig, SiteConfig};
use vakio_runtime::draw::Target;
use vakio_runtime::renderer::fixture::FixtureRenderer;
use vakio_runtime::renderer::Renderer;
use vakio_runtime::rest::{router, AppState};

const BASE: &str = "https://vakio.test";

fn config(base: &str) -> RuntimeConfig {
    RuntimeConfig {
        settle: Duration::ZERO,
        job_attempts: 1,
        site: SiteConfig::for_base(base, vec!["fi".to_string()]),
        ..RuntimeConfig::default()
    }
}

fn draw_payload() -> Value {
    let games: Vec<Value> = (1..=13)
        .map(|i| {
            json!({
                "homeName": format!("Home {i}"),
                "awayName": format!("Away {i}"),
                "choices": [
                    {"percentage": 50, "odds": 2.0},
                    {"percentage": 25, "odds": 4.0},
                    {"percentage": 25, "odds": 4.0}
                ]
            })
        })
        .collect();
    json!({"draws": [{"id": "a_100522", "rows": games}]})
}

fn site_fixture() -> Value {
    json!({
        "pages": [
            {
                "urlContains": "?kohde=a_100522",
                "responses": [{
                    "url": "https://vakio.test/api/sport-open-games/v1/games/SPORT/draws/a_100522",
                    "status": 200,
                    "mimeType": "application/json",
                    "body": draw_payload().to_string()
                }]
            },
            {
                "urlContains": "/fi/vedonlyonti/vakio",
                "html": "<a href='?kohde=a_100516'>old</a><a href='?kohde=a_100522'>new</a>"
            },
            {"urlContains": "", "html": "<html><body>home</body></html>"}
        ]
    })
}

fn fixture_renderer() -> Arc<FixtureRenderer> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(site_fixture().to_string().as_bytes()).unwrap();
    Arc::new(FixtureRenderer::from_file(file.path()).unwrap())
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn auto_job_discovers_newest_and_scrapes_it() {
    let renderer = fixture_renderer();
    let services = build_services(&config(BASE), renderer.clone()).unwrap();

    let receipt = services.scheduler.kick(&Target::Auto, false);
    assert!(receipt.accepted);
    services.scheduler.join(&Target::Auto).await;

    let snap = services.scheduler.status(&Target::Auto);
    assert!(snap.ok, "job failed: {:?}", snap.last_error);
    assert_eq!(snap.mode, "auto");
    assert_eq!(snap.kohde.as_deref(), Some("a_100522"));
    assert_eq!(
        snap.source_tag.as_deref(),
        Some("network:/api/sport-open-games/v1/games/SPORT/draws/a_100522")
    );
    assert_eq!(snap.matches.as_ref().map(Vec::len), Some(13));

    // Mirrored under the concrete identifier.
    let concrete = services
        .scheduler
        .status(&Target::Draw("a_100522".to_string()));
    assert!(concrete.ok);

    assert_eq!(renderer.active_contexts(), 0);
    assert_eq!(renderer.contexts_opened(), 1);
}

#[tokio::test]
async fn unknown_identifier_fails_as_data() {
    let renderer = fixture_renderer();
    let services = build_services(&config(BASE), renderer).unwrap();
    let target = Target::Draw("a_1".to_string());

    services.scheduler.kick(&target, false);
    services.scheduler.join(&target).await;

    let snap = services.scheduler.status(&target);
    assert!(!snap.ok);
    assert!(!snap.in_progress);
    assert_eq!(snap.error_code, Some("E_NO_MATCHES"));
    assert!(snap.matches.is_none());
}

#[tokio::test]
async fn rest_kick_then_last() {
    let renderer = fixture_renderer();
    let services = build_services(&config(BASE), renderer.clone()).unwrap();
    let scheduler = services.scheduler.clone();
    let app = router(Arc::new(AppState {
        scheduler: services.scheduler,
        finder: services.finder,
        events: services.events,
        renderer,
        started_at: Instant::now(),
    }));

    let (status, body) = get_json(&app, "/api/veikkaus/last?kohde=a_100522").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: body,
        expected: json!({"ok": false, "mode": "kohde", "kohde": "a_100522", "inProgress": false})
    );

    let (_, body) = get_json(&app, "/api/veikkaus/kick?kohde=a_100522").await;
    assert_json_include!(
        actual: body,
        expected: json!({
            "ok": true,
            "accepted": true,
            "alreadyRunning": false,
            "reusedCache": false,
            "mode": "kohde",
            "target": "a_100522",
            "kohde": "a_100522",
            "inProgress": true
        })
    );

    scheduler.join(&Target::Draw("a_100522".to_string())).await;

    let (_, body) = get_json(&app, "/api/veikkaus/last?kohde=a_100522").await;
    assert_json_include!(actual: body.clone(), expected: json!({"ok": true, "lastError": null}));
    let first = &body["matches"][0];
    assert_eq!(first["index"], 1);
    assert_eq!(first["percent"], json!({"1": 50.0, "X": 25.0, "2": 25.0}));
    assert_eq!(first["oddsProbPct"], json!({"1": 50.0, "X": 25.0, "2": 25.0}));
    assert_eq!(body["matches"].as_array().map(Vec::len), Some(13));

    let (_, body) = get_json(&app, "/api/veikkaus/kick?kohde=a_100522").await;
    assert_json_include!(
        actual: body,
        expected: json!({"accepted": false, "reusedCache": true, "message": "Using cached result"})
    );

    let (_, body) = get_json(&app, "/api/veikkaus/kick?kohde=a_100522&force=1").await;
    assert_json_include!(actual: body, expected: json!({"accepted": true}));
    scheduler.join(&Target::Draw("a_100522".to_string())).await;

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: body,
        expected: json!({"ok": true, "status": "ok", "activeSessions": 0, "runningJobs": 0})
    );
}

#[tokio::test]
async fn rest_find_reports_newest_identifier() {
    let renderer = fixture_renderer();
    let services = build_services(&config(BASE), renderer.clone()).unwrap();
    let app = router(Arc::new(AppState {
        scheduler: services.scheduler,
        finder: services.finder,
        events: services.events,
        renderer,
        started_at: Instant::now(),
    }));

    let (status, body) = get_json(&app, "/api/veikkaus/find").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ok": true, "kohde": "a_100522", "identifiers": ["a_100522", "a_100516"]})
    );
}

#[tokio::test]
async fn rest_find_404_when_nothing_is_open() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>no draws today</p>"))
        .mount(&server)
        .await;

    let renderer = Arc::new(FixtureRenderer::new(
        serde_json::from_value(json!({"pages": [{"html": "<p>closed</p>"}]})).unwrap(),
    ));
    let services = build_services(&config(&server.uri()), renderer.clone()).unwrap();
    let app = router(Arc::new(AppState {
        scheduler: services.scheduler,
        finder: services.finder,
        events: services.events,
        renderer,
        started_at: Instant::now(),
    }));

    let (status, body) = get_json(&app, "/api/veikkaus/find").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_include!(actual: body, expected: json!({"ok": false}));
}
