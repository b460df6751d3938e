// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Attempt-scoped acquisition errors.
//!
//! Every variant terminates one acquisition attempt and is recorded into
//! the job state as data. None of them crosses the scheduler boundary as
//! a fault.

use std::time::Duration;

/// Why an acquisition attempt did not produce a draw.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("acquisition exceeded its {budget_ms}ms budget")]
    NavigationTimeout { budget_ms: u64 },

    #[error("no 13-match draw found (best source yielded {best_partial} matches)")]
    NoMatchesFound { best_partial: usize },

    /// A payload failed to parse. Skipped during collection, never
    /// returned from an attempt; kept for logging and counters.
    #[error("malformed payload from {source_tag}: {reason}")]
    MalformedSource { source_tag: String, reason: String },

    #[error("browser launch failed: {0}")]
    DriverLaunchFailure(String),

    #[error("could not discover a draw identifier")]
    DiscoveryEmpty,
}

impl AcquisitionError {
    pub fn timeout(budget: Duration) -> Self {
        AcquisitionError::NavigationTimeout {
            budget_ms: budget.as_millis() as u64,
        }
    }

    /// Stable short code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            AcquisitionError::NavigationTimeout { .. } => "E_TIMEOUT",
            AcquisitionError::NoMatchesFound { .. } => "E_NO_MATCHES",
            AcquisitionError::MalformedSource { .. } => "E_MALFORMED_SOURCE",
            AcquisitionError::DriverLaunchFailure(_) => "E_DRIVER_LAUNCH",
            AcquisitionError::DiscoveryEmpty => "E_DISCOVERY_EMPTY",
        }
    }

    /// Whether the caller may spend another attempt on this target.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AcquisitionError::DiscoveryEmpty)
    }
}
