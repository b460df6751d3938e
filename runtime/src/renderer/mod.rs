// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page acquisition.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide, or canned fixtures).
//! A context is one exclusive browsing session: its captured network
//! responses never interleave with another job's.

pub mod chromium;
pub mod fixture;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// An HTTP response observed while a page was loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub url: String,
    pub status: u16,
    pub mime_type: String,
    /// Decoded response body.
    pub body: String,
}

impl CapturedResponse {
    /// Whether the body is worth handing to the JSON parser.
    pub fn looks_like_json(&self) -> bool {
        if self.mime_type.contains("json") {
            return true;
        }
        matches!(self.body.trim_start().chars().next(), Some('{') | Some('['))
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    /// Promises are awaited.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Register a script evaluated before any page script on every navigation.
    async fn add_init_script(&mut self, script: &str) -> Result<()>;
    /// Responses observed since the last [`RenderContext::clear_captured`].
    async fn captured_responses(&self) -> Vec<CapturedResponse>;
    /// Drop everything captured so far.
    async fn clear_captured(&self);
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// HTTP-only discovery keeps working; draw jobs fail with a launch error.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("Browser not available (HTTP-only mode)"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}
