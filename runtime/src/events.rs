// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vakio Event Bus: typed job lifecycle events.
//!
//! The EventBus is a `tokio::sync::broadcast` channel that carries
//! [`DrawEvent`] values. The REST SSE endpoint and the CLI subscribe
//! independently. When no subscribers exist, events are silently dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event the runtime emits. Serialized to JSON for SSE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DrawEvent {
    /// A job was dispatched for a key.
    JobStarted {
        key: String,
        run_id: String,
        mode: String,
        timestamp: String,
    },
    /// A kick was answered from the fresh cache.
    JobReused {
        key: String,
        draw_id: String,
        timestamp: String,
    },
    /// A job produced a complete draw.
    JobSucceeded {
        key: String,
        run_id: String,
        draw_id: String,
        source_tag: String,
        attempts: u32,
        elapsed_ms: u64,
    },
    /// A job gave up.
    JobFailed {
        key: String,
        run_id: String,
        error: String,
        code: String,
        attempts: u32,
        elapsed_ms: u64,
    },
    /// Listing pages were scanned for identifiers.
    DiscoveryCompleted {
        identifiers: usize,
        newest: Option<String>,
    },
}

/// Broadcast channel for [`DrawEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DrawEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: DrawEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DrawEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Whether `event` concerns the job key `key`.
pub fn event_matches_key(event: &DrawEvent, key: &str) -> bool {
    match event {
        DrawEvent::JobStarted { key: k, .. }
        | DrawEvent::JobReused { key: k, .. }
        | DrawEvent::JobSucceeded { key: k, .. }
        | DrawEvent::JobFailed { key: k, .. } => k == key,
        // Discovery feeds auto jobs only
        DrawEvent::DiscoveryCompleted { .. } => key == crate::draw::AUTO_KEY,
    }
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
