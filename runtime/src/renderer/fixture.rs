// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer that replays recorded pages from a JSON fixture.
//!
//! Used by the test-suite and by `vakio scrape --fixture` to exercise the
//! whole acquisition path without a browser. A fixture lists pages; the
//! first page whose `urlContains` occurs in the navigated URL is served.
//!
//! ```json
//! {
//!   "pages": [{
//!     "urlContains": "kohde=a_1",
//!     "html": "<html>...</html>",
//!     "responses": [{"url": "...", "status": 200, "mimeType": "application/json", "body": "{...}"}],
//!     "scripts": [{"marker": "__vakio_global_probe", "result": {...}}]
//!   }]
//! }
//! ```

use super::{CapturedResponse, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A whole fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(default)]
    pub pages: Vec<FixturePage>,
    /// When set, every `new_context` call fails (simulates a dead browser).
    #[serde(default)]
    pub fail_launch: bool,
}

/// One recorded page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixturePage {
    /// Substring of the URL this page answers; empty matches everything.
    #[serde(default)]
    pub url_contains: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub responses: Vec<CapturedResponse>,
    #[serde(default)]
    pub scripts: Vec<ScriptResult>,
    /// Navigation to this page fails.
    #[serde(default)]
    pub fail: bool,
    /// Artificial load time.
    #[serde(default)]
    pub delay_ms: u64,
}

/// Canned result for any script containing `marker`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptResult {
    pub marker: String,
    pub result: Value,
}

impl Fixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid fixture JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&raw)
    }

    fn page_for(&self, url: &str) -> Option<&FixturePage> {
        self.pages
            .iter()
            .find(|p| p.url_contains.is_empty() || url.contains(&p.url_contains))
    }
}

/// Serves [`Fixture`] pages through the renderer traits.
pub struct FixtureRenderer {
    fixture: Arc<Fixture>,
    visited: Arc<Mutex<Vec<String>>>,
    active_count: Arc<AtomicUsize>,
    opened: AtomicUsize,
}

impl FixtureRenderer {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture: Arc::new(fixture),
            visited: Arc::new(Mutex::new(Vec::new())),
            active_count: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Fixture::from_file(path)?))
    }

    /// Every URL navigated to, across all contexts, in order.
    pub async fn visited(&self) -> Vec<String> {
        self.visited.lock().await.clone()
    }

    /// How many contexts were ever created.
    pub fn contexts_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        if self.fixture.fail_launch {
            bail!("fixture browser refuses to launch");
        }
        self.opened.fetch_add(1, Ordering::Relaxed);
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FixtureContext {
            fixture: Arc::clone(&self.fixture),
            visited: Arc::clone(&self.visited),
            active_count: Arc::clone(&self.active_count),
            current: None,
            captured: Mutex::new(Vec::new()),
            init_scripts: Vec::new(),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

struct FixtureContext {
    fixture: Arc<Fixture>,
    visited: Arc<Mutex<Vec<String>>>,
    active_count: Arc<AtomicUsize>,
    current: Option<FixturePage>,
    captured: Mutex<Vec<CapturedResponse>>,
    init_scripts: Vec<String>,
}

#[async_trait]
impl RenderContext for FixtureContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        self.visited.lock().await.push(url.to_string());

        let Some(page) = self.fixture.page_for(url).cloned() else {
            self.current = None;
            bail!("no fixture page for {url}");
        };
        if page.delay_ms > timeout_ms {
            tokio::time::sleep(std::time::Duration::from_millis(timeout_ms)).await;
            bail!("navigation timed out after {timeout_ms}ms");
        }
        if page.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(page.delay_ms)).await;
        }
        if page.fail {
            self.current = None;
            bail!("navigation failed: net::ERR_FAILED");
        }

        self.captured
            .lock()
            .await
            .extend(page.responses.iter().cloned());
        self.current = Some(page.clone());

        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: page.delay_ms,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        let Some(page) = &self.current else {
            return Ok(Value::Null);
        };
        Ok(page
            .scripts
            .iter()
            .find(|s| script.contains(&s.marker))
            .map(|s| s.result.clone())
            .unwrap_or(Value::Null))
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self
            .current
            .as_ref()
            .map(|p| p.html.clone())
            .unwrap_or_default())
    }

    async fn add_init_script(&mut self, script: &str) -> Result<()> {
        self.init_scripts.push(script.to_string());
        Ok(())
    }

    async fn captured_responses(&self) -> Vec<CapturedResponse> {
        self.captured.lock().await.clone()
    }

    async fn clear_captured(&self) {
        self.captured.lock().await.clear();
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
