// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Vakio runtime library: scrape the 13-match Vakio draw from a
//! JavaScript-heavy site and enrich it with odds-implied probabilities.
//!
//! The pure pipeline lives in [`extraction`]; [`acquisition`] drives a
//! browser to feed it; [`jobs`] deduplicates and caches runs; [`rest`] and
//! [`cli`] expose it.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod draw;
pub mod error;
pub mod events;
pub mod extraction;
pub mod jobs;
pub mod maintenance;
pub mod renderer;
pub mod rest;
