// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.
//!
//! Each context owns one page plus a listener task that records JSON-ish
//! network responses (`Network.responseReceived`, body fetched on
//! `Network.loadingFinished`).

use super::{CapturedResponse, NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId, ResourceType,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

/// Desktop Chrome user agent presented to the site.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Maximum responses kept per context between clears.
const MAX_CAPTURED: usize = 64;

/// Response bodies larger than this are not captured (2 MB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path (VAKIO_CHROMIUM_PATH)
    if let Some(p) = explicit {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser", "google-chrome-stable"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common install locations
    let common: &[&str] = if cfg!(target_os = "macos") {
        &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/google-chrome",
            "/opt/google/chrome/chrome",
        ]
    };
    common.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn new(chromium_path: Option<&Path>) -> Result<Self> {
        let chrome_path = find_chromium(chromium_path)
            .context("Chromium not found. Install it or set VAKIO_CHROMIUM_PATH.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--window-size=1200,900")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("Chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        if let Err(e) = page.set_user_agent(USER_AGENT).await {
            tracing::debug!("set_user_agent failed: {e}");
        }

        let captured = Arc::new(Mutex::new(Vec::new()));
        let listener = spawn_capture(page.clone(), Arc::clone(&captured))
            .await
            .context("failed to subscribe to network events")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            captured,
            listener,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!("browser close failed: {e}");
        }
        self.handler.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

enum NetEvent {
    Response(Arc<EventResponseReceived>),
    Finished(Arc<EventLoadingFinished>),
}

struct PendingResponse {
    url: String,
    status: u16,
    mime_type: String,
}

/// Record JSON-ish responses into `sink` until the page goes away.
async fn spawn_capture(
    page: Page,
    sink: Arc<Mutex<Vec<CapturedResponse>>>,
) -> Result<JoinHandle<()>> {
    let responses = page.event_listener::<EventResponseReceived>().await?;
    let finished = page.event_listener::<EventLoadingFinished>().await?;

    Ok(tokio::spawn(async move {
        let mut events = Box::pin(futures::stream::select(
            responses.map(NetEvent::Response),
            finished.map(NetEvent::Finished),
        ));
        let mut pending: HashMap<RequestId, PendingResponse> = HashMap::new();

        while let Some(event) = events.next().await {
            match event {
                NetEvent::Response(ev) => {
                    let resp = &ev.response;
                    let is_api_call = matches!(ev.r#type, ResourceType::Xhr | ResourceType::Fetch);
                    if !is_api_call && !resp.mime_type.contains("json") {
                        continue;
                    }
                    pending.insert(
                        ev.request_id.clone(),
                        PendingResponse {
                            url: resp.url.clone(),
                            status: resp.status.clamp(0, u16::MAX as i64) as u16,
                            mime_type: resp.mime_type.clone(),
                        },
                    );
                }
                NetEvent::Finished(ev) => {
                    let Some(meta) = pending.remove(&ev.request_id) else {
                        continue;
                    };
                    if sink.lock().await.len() >= MAX_CAPTURED {
                        continue;
                    }
                    let body = match page
                        .execute(GetResponseBodyParams::new(ev.request_id.clone()))
                        .await
                    {
                        Ok(r) => decode_body(&r.result.body, r.result.base64_encoded),
                        Err(e) => {
                            tracing::debug!("no body for {}: {e}", meta.url);
                            continue;
                        }
                    };
                    if body.len() > MAX_BODY_BYTES {
                        continue;
                    }
                    let mut captured = sink.lock().await;
                    if captured.len() < MAX_CAPTURED {
                        captured.push(CapturedResponse {
                            url: meta.url,
                            status: meta.status,
                            mime_type: meta.mime_type,
                            body,
                        });
                    }
                }
            }
        }
    }))
}

fn decode_body(body: &str, base64_encoded: bool) -> String {
    if !base64_encoded {
        return body.to_string();
    }
    match base64::engine::general_purpose::STANDARD.decode(body) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    captured: Arc<Mutex<Vec<CapturedResponse>>>,
    listener: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid evaluate params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn add_init_script(&mut self, script: &str) -> Result<()> {
        self.page
            .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .context("failed to add init script")?;
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
        self.listener.abort();
        let _ = self.page.close().await;
        Ok(())
    }
}

/// Launches Chromium on first use.
///
/// The HTTP server comes up before the browser; a failed launch is not
/// remembered, so the next job tries again.
pub struct LazyChromium {
    chromium_path: Option<PathBuf>,
    cell: OnceCell<ChromiumRenderer>,
}

impl LazyChromium {
    pub fn new(chromium_path: Option<PathBuf>) -> Self {
        Self {
            chromium_path,
            cell: OnceCell::new(),
        }
    }

    async fn renderer(&self) -> Result<&ChromiumRenderer> {
        self.cell
            .get_or_try_init(|| ChromiumRenderer::new(self.chromium_path.as_deref()))
            .await
    }
}

#[async_trait]
impl Renderer for LazyChromium {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.renderer().await?.new_context().await
    }

    async fn shutdown(&self) -> Result<()> {
        match self.cell.get() {
            Some(renderer) => renderer.shutdown().await,
            None => Ok(()),
        }
    }

    fn active_contexts(&self) -> usize {
        self.cell.get().map_or(0, |r| r.active_contexts())
    }
}
