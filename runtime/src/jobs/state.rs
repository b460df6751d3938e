// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-key job state and the snapshot handed to callers.

use super::cache::CachedDraw;
use crate::acquisition::DebugSnapshot;
use crate::draw::{Draw, Match, Target};
use crate::error::AcquisitionError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Mutable state of one key. Only the job owning the key writes it.
#[derive(Debug, Clone)]
pub struct JobState {
    pub in_progress: bool,
    pub last_error: Option<String>,
    pub error_code: Option<&'static str>,
    pub updated_at: Option<DateTime<Utc>>,
    pub draw: Option<Draw>,
    pub source_tag: Option<String>,
    /// Concrete identifier of the last run (differs from the key in auto mode).
    pub draw_id: Option<String>,
    pub run_id: Option<Uuid>,
    pub debug: Option<DebugSnapshot>,
    /// Last time anything happened on this key; drives pruning.
    pub touched: Instant,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            in_progress: false,
            last_error: None,
            error_code: None,
            updated_at: None,
            draw: None,
            source_tag: None,
            draw_id: None,
            run_id: None,
            debug: None,
            touched: Instant::now(),
        }
    }

    /// Mark the key as owned by a new run.
    pub fn begin(&mut self, run_id: Uuid) {
        self.in_progress = true;
        self.last_error = None;
        self.error_code = None;
        self.run_id = Some(run_id);
        self.touched = Instant::now();
    }

    /// Adopt a successful outcome (fresh run or cache hit).
    pub fn apply_success(&mut self, cached: &CachedDraw, debug: Option<DebugSnapshot>) {
        self.in_progress = false;
        self.last_error = None;
        self.error_code = None;
        self.updated_at = Some(cached.updated_at);
        self.draw = Some(cached.draw.clone());
        self.source_tag = Some(cached.source_tag.clone());
        self.draw_id = Some(cached.draw_id.clone());
        self.debug = debug;
        self.touched = Instant::now();
    }

    /// Record a failed run. The previous draw is dropped: a snapshot only
    /// ever shows the outcome of the latest run.
    pub fn apply_failure(
        &mut self,
        error: &AcquisitionError,
        draw_id: Option<String>,
        debug: DebugSnapshot,
    ) {
        self.in_progress = false;
        self.last_error = Some(error.to_string());
        self.error_code = Some(error.code());
        self.updated_at = Some(Utc::now());
        self.draw = None;
        self.source_tag = None;
        self.draw_id = draw_id;
        self.debug = Some(debug);
        self.touched = Instant::now();
    }

    pub fn snapshot(&self, target: &Target) -> JobSnapshot {
        JobSnapshot {
            ok: self.draw.is_some() && self.last_error.is_none(),
            mode: target.mode(),
            kohde: self
                .draw_id
                .clone()
                .or_else(|| target.draw_id().map(String::from)),
            in_progress: self.in_progress,
            last_error: self.last_error.clone(),
            error_code: self.error_code,
            updated_at: self.updated_at,
            source_tag: self.source_tag.clone(),
            run_id: self.run_id.map(|id| id.to_string()),
            matches: self.draw.as_ref().map(|d| d.matches.clone()),
            debug: self.debug.clone(),
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a key, as served by `last`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub ok: bool,
    pub mode: &'static str,
    pub kohde: Option<String>,
    pub in_progress: bool,
    pub last_error: Option<String>,
    pub error_code: Option<&'static str>,
    pub updated_at: Option<DateTime<Utc>>,
    pub source_tag: Option<String>,
    pub run_id: Option<String>,
    /// Present only for a complete draw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<Match>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugSnapshot>,
}
