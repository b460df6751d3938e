// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Job orchestration: per-key dedup, result cache, background runs.

pub mod cache;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use scheduler::{JobScheduler, KickReceipt, SchedulerSettings};
pub use state::JobSnapshot;
