// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Draw acquisition: drive a browser session, gather JSON from every
//! place the site might put it, and hand each document to extraction.

pub mod discovery;
pub mod http_client;
pub mod sources;
pub mod strategy;

use serde::{Deserialize, Serialize};

const MAX_SAMPLES: usize = 3;
const SAMPLE_CHARS: usize = 500;
const HTML_CHARS: usize = 1_000;
const MAX_PARTIALS: usize = 32;
const MAX_NAV_ERRORS: usize = 8;

/// One captured payload excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadSample {
    pub source: String,
    pub excerpt: String,
}

/// How many matches one source normalized before falling short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCount {
    pub source: String,
    pub matches: usize,
}

/// Bounded diagnostics attached to a job's state.
///
/// Every collection is capped so a misbehaving site cannot grow memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub samples: Vec<PayloadSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_excerpt: Option<String>,
    pub partial_counts: Vec<PartialCount>,
    pub navigation_errors: Vec<String>,
    pub malformed_sources: usize,
}

impl DebugSnapshot {
    pub fn record_sample(&mut self, source: &str, payload: &str) {
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(PayloadSample {
                source: source.to_string(),
                excerpt: truncate_chars(payload, SAMPLE_CHARS),
            });
        }
    }

    pub fn record_partial(&mut self, source: &str, matches: usize) {
        if self.partial_counts.len() < MAX_PARTIALS {
            self.partial_counts.push(PartialCount {
                source: source.to_string(),
                matches,
            });
        }
    }

    pub fn record_navigation_error(&mut self, message: impl Into<String>) {
        if self.navigation_errors.len() < MAX_NAV_ERRORS {
            self.navigation_errors
                .push(truncate_chars(&message.into(), SAMPLE_CHARS));
        }
    }

    pub fn record_malformed(&mut self) {
        self.malformed_sources += 1;
    }

    pub fn set_html(&mut self, html: &str) {
        if !html.is_empty() {
            self.html_excerpt = Some(truncate_chars(html, HTML_CHARS));
        }
    }

    /// Largest partial match count seen across all sources.
    pub fn best_partial(&self) -> usize {
        self.partial_counts
            .iter()
            .map(|p| p.matches)
            .max()
            .unwrap_or(0)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
