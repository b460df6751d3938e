// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! One acquisition attempt for one draw.
//!
//! ```text
//! START -> HOME (consent, best-effort) -> TARGET(locale A) -> COLLECT
//!       -> TARGET(locale B) -> COLLECT -> EXHAUSTED
//! ```
//!
//! COLLECT walks network bodies, inline scripts, global state and REST
//! probes in that order. The first document that normalizes to a complete
//! draw wins. The whole attempt runs under one wall-clock budget.

use super::sources::{self, DrawSource, SourceDocument};
use super::DebugSnapshot;
use crate::config::{RuntimeConfig, SiteConfig};
use crate::draw::Draw;
use crate::error::AcquisitionError;
use crate::extraction::aliases::FieldAliases;
use crate::extraction::{scan_document, ScanOutcome};
use crate::renderer::RenderContext;
use std::sync::Arc;
use std::time::Duration;

/// Hides the automation flag before any page script runs.
const WEBDRIVER_SHIM: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => false });";

/// Clicks the first visible consent button it recognises.
const CONSENT_SCRIPT: &str = r#"(() => {
  const ids = ['#onetrust-accept-btn-handler', '#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll'];
  for (const sel of ids) {
    const el = document.querySelector(sel);
    if (el) { el.click(); return sel; }
  }
  const words = ['hyväksy', 'godkänn', 'acceptera', 'accept'];
  for (const b of document.querySelectorAll('button')) {
    const t = (b.innerText || '').trim().toLowerCase();
    if (words.some(w => t.startsWith(w))) { b.click(); return t; }
  }
  return null;
})()"#;

/// Knobs for one attempt.
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub site: SiteConfig,
    pub nav_timeout_ms: u64,
    pub settle: Duration,
    pub budget: Duration,
}

impl From<&RuntimeConfig> for AcquisitionSettings {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            site: config.site.clone(),
            nav_timeout_ms: config.nav_timeout_ms,
            settle: config.settle,
            budget: config.attempt_budget,
        }
    }
}

/// A complete draw and the source that produced it.
#[derive(Debug, Clone)]
pub struct AcquiredDraw {
    pub draw: Draw,
    pub source: DrawSource,
}

/// Stateless per call: everything mutable lives in the render context
/// and the caller's debug snapshot.
pub struct DrawAcquirer {
    settings: AcquisitionSettings,
    aliases: Arc<FieldAliases>,
}

impl DrawAcquirer {
    pub fn new(settings: AcquisitionSettings, aliases: Arc<FieldAliases>) -> Self {
        Self { settings, aliases }
    }

    /// Run one budgeted attempt against `draw_id`.
    pub async fn acquire(
        &self,
        ctx: &mut dyn RenderContext,
        draw_id: &str,
        debug: &mut DebugSnapshot,
    ) -> Result<AcquiredDraw, AcquisitionError> {
        let budget = self.settings.budget;
        match tokio::time::timeout(budget, self.run_attempt(ctx, draw_id, debug)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("attempt for {draw_id} exceeded {}ms", budget.as_millis());
                Err(AcquisitionError::timeout(budget))
            }
        }
    }

    async fn run_attempt(
        &self,
        ctx: &mut dyn RenderContext,
        draw_id: &str,
        debug: &mut DebugSnapshot,
    ) -> Result<AcquiredDraw, AcquisitionError> {
        let site = &self.settings.site;
        let nav_timeout = self.settings.nav_timeout_ms;

        if let Err(e) = ctx.add_init_script(WEBDRIVER_SHIM).await {
            tracing::debug!("init script not installed: {e}");
        }

        match ctx.navigate(&site.home_url, nav_timeout).await {
            Ok(_) => match ctx.execute_js(CONSENT_SCRIPT).await {
                Ok(serde_json::Value::String(clicked)) => {
                    tracing::debug!("consent dismissed via {clicked}")
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("consent script failed: {e}"),
            },
            Err(e) => {
                tracing::debug!("home navigation failed: {e}");
                debug.record_navigation_error(format!("home: {e}"));
            }
        }

        for locale in &site.locales {
            ctx.clear_captured().await;
            let url = site.draw_url(locale, draw_id);
            tracing::info!("navigating to {url}");

            // Responses that landed before a navigation error are still worth a look.
            if let Err(e) = ctx.navigate(&url, nav_timeout).await {
                tracing::warn!("navigation to {url} failed: {e}");
                debug.record_navigation_error(format!("{locale}: {e}"));
            } else if !self.settings.settle.is_zero() {
                tokio::time::sleep(self.settings.settle).await;
            }

            if let Some(found) = self.collect(ctx, draw_id, debug).await {
                tracing::info!("draw {draw_id} found via {}", found.source);
                return Ok(found);
            }
        }

        Err(AcquisitionError::NoMatchesFound {
            best_partial: debug.best_partial(),
        })
    }

    async fn collect(
        &self,
        ctx: &mut dyn RenderContext,
        draw_id: &str,
        debug: &mut DebugSnapshot,
    ) -> Option<AcquiredDraw> {
        for doc in sources::network_documents(ctx, debug).await {
            if let Some(found) = self.scan(doc, draw_id, debug) {
                return Some(found);
            }
        }

        match ctx.get_html().await {
            Ok(html) => {
                debug.set_html(&html);
                for doc in sources::inline_script_documents(&html, debug) {
                    if let Some(found) = self.scan(doc, draw_id, debug) {
                        return Some(found);
                    }
                }
            }
            Err(e) => tracing::debug!("page HTML unavailable: {e}"),
        }

        let keys = &self.settings.site.global_state_keys;
        for doc in sources::global_state_documents(ctx, keys, debug).await {
            if let Some(found) = self.scan(doc, draw_id, debug) {
                return Some(found);
            }
        }

        for path in self.settings.site.rest_probes(draw_id) {
            if let Some(doc) = sources::rest_probe_document(ctx, &path, debug).await {
                if let Some(found) = self.scan(doc, draw_id, debug) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn scan(
        &self,
        doc: SourceDocument,
        draw_id: &str,
        debug: &mut DebugSnapshot,
    ) -> Option<AcquiredDraw> {
        match scan_document(&doc.document, draw_id, &self.aliases) {
            ScanOutcome::Complete(draw) => Some(AcquiredDraw {
                draw,
                source: doc.source,
            }),
            ScanOutcome::Partial(n) => {
                let tag = doc.source.to_string();
                tracing::debug!("{tag}: {n} matches");
                if n > 0 {
                    debug.record_partial(&tag, n);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::fixture::{Fixture, FixtureRenderer};
    use crate::renderer::Renderer;
    use serde_json::{json, Value};

    fn rows(n: usize) -> Value {
        let rows: Vec<Value> = (1..=n)
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
        json!({"draws": [{"rows": rows}]})
    }

    fn settings() -> AcquisitionSettings {
        AcquisitionSettings {
            site: SiteConfig::for_base("https://x.test", vec!["sv".into(), "fi".into()]),
            nav_timeout_ms: 5_000,
            settle: Duration::ZERO,
            budget: Duration::from_secs(10),
        }
    }

    fn acquirer() -> DrawAcquirer {
        DrawAcquirer::new(settings(), Arc::new(FieldAliases::builtin()))
    }

    fn response(url: &str, body: &Value) -> Value {
        json!({"url": url, "status": 200, "mimeType": "application/json", "body": body.to_string()})
    }

    #[tokio::test]
    async fn test_network_source_wins() {
        let fixture = Fixture::from_json(
            &json!({"pages": [
                {"urlContains": "/sv/", "responses": [
                    response("https://x.test/api/short", &rows(12)),
                    response("https://x.test/api/full", &rows(13))
                ]},
                {"urlContains": ""}
            ]})
            .to_string(),
        )
        .unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();
        let mut debug = DebugSnapshot::default();

        let found = acquirer()
            .acquire(ctx.as_mut(), "a_1", &mut debug)
            .await
            .unwrap();
        assert_eq!(found.source.to_string(), "network:/api/full");
        assert_eq!(found.draw.matches.len(), 13);
        assert_eq!(debug.best_partial(), 12);

        let visited = renderer.visited().await;
        assert_eq!(visited[0], "https://x.test/");
        assert_eq!(visited.len(), 2);
    }

    #[tokio::test]
    async fn test_falls_through_to_second_locale_and_rest_probe() {
        let fixture = Fixture::from_json(
            &json!({"pages": [
                {"urlContains": "/fi/", "scripts": [
                    {"marker": "/api/sport-games/v1/draws/a_1", "result": rows(13).to_string()}
                ]},
                {"urlContains": ""}
            ]})
            .to_string(),
        )
        .unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();
        let mut debug = DebugSnapshot::default();

        let found = acquirer()
            .acquire(ctx.as_mut(), "a_1", &mut debug)
            .await
            .unwrap();
        assert_eq!(found.source.to_string(), "rest:/api/sport-games/v1/draws/a_1");
        assert_eq!(renderer.visited().await.len(), 3);
    }

    #[tokio::test]
    async fn test_global_state_source() {
        let fixture = Fixture::from_json(
            &json!({"pages": [
                {"urlContains": "", "scripts": [
                    {"marker": "__vakio_global_probe", "result": {"__INITIAL_STATE__": rows(13).to_string()}}
                ]}
            ]})
            .to_string(),
        )
        .unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();
        let mut debug = DebugSnapshot::default();

        let found = acquirer()
            .acquire(ctx.as_mut(), "a_1", &mut debug)
            .await
            .unwrap();
        assert_eq!(found.source.to_string(), "global:__INITIAL_STATE__");
    }

    #[tokio::test]
    async fn test_partial_everywhere_is_no_matches() {
        let fixture = Fixture::from_json(
            &json!({"pages": [
                {"urlContains": "kohde", "responses": [response("https://x.test/api/d", &rows(10))]},
                {"urlContains": ""}
            ]})
            .to_string(),
        )
        .unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();
        let mut debug = DebugSnapshot::default();

        let err = acquirer()
            .acquire(ctx.as_mut(), "a_1", &mut debug)
            .await
            .unwrap_err();
        assert_eq!(err, AcquisitionError::NoMatchesFound { best_partial: 10 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_is_timeout() {
        let fixture = Fixture::from_json(
            &json!({"pages": [{"urlContains": "", "delayMs": 4_000}]}).to_string(),
        )
        .unwrap();
        let renderer = FixtureRenderer::new(fixture);
        let mut ctx = renderer.new_context().await.unwrap();
        let mut debug = DebugSnapshot::default();

        let mut s = settings();
        s.budget = Duration::from_secs(6);
        let acquirer = DrawAcquirer::new(s, Arc::new(FieldAliases::builtin()));

        let err = acquirer
            .acquire(ctx.as_mut(), "a_1", &mut debug)
            .await
            .unwrap_err();
        assert_eq!(err, AcquisitionError::NavigationTimeout { budget_ms: 6_000 });
    }
}
