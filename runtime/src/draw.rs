// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Draw data model: matches, outcome symbols and scrape targets.
//!
//! A [`Draw`] can only be constructed from exactly [`DRAW_SIZE`] valid
//! [`Match`] records; there is no partial-draw type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of matches in a complete draw.
pub const DRAW_SIZE: usize = 13;

/// Job/cache key used for "discover the newest draw".
pub const AUTO_KEY: &str = "auto";

/// One of the three pool outcomes. Serialized as `"1"`, `"X"`, `"2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "1")]
    Home,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    Away,
}

impl Outcome {
    /// Positional order used when mapping outcome collections.
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn symbol(self) -> &'static str {
        match self {
            Outcome::Home => "1",
            Outcome::Draw => "X",
            Outcome::Away => "2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Per-outcome numeric values (percentages, odds, derived metrics).
pub type OutcomeMap = BTreeMap<Outcome, f64>;

/// One betting event inside a draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// 1-based position within the draw.
    pub index: usize,
    pub home: String,
    pub away: String,
    /// Public betting percentage per outcome (all three symbols present).
    pub percent: OutcomeMap,
    /// Decimal odds, only the symbols the source exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<OutcomeMap>,
    /// Margin-normalized implied probability (sums to ~100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_prob_pct: Option<OutcomeMap>,
    /// `percent - oddsProbPct` per symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<OutcomeMap>,
}

impl Match {
    pub fn percent_sum(&self) -> f64 {
        self.percent.values().sum()
    }

    /// Non-empty participants and a positive percentage sum.
    pub fn is_valid(&self) -> bool {
        !self.home.trim().is_empty() && !self.away.trim().is_empty() && self.percent_sum() > 0.0
    }
}

/// The complete set of matches for one scheduled pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draw {
    pub draw_id: String,
    pub matches: Vec<Match>,
}

impl Draw {
    /// Build a draw, rejecting anything but exactly [`DRAW_SIZE`] valid matches.
    pub fn new(draw_id: impl Into<String>, matches: Vec<Match>) -> Option<Self> {
        if matches.len() != DRAW_SIZE || !matches.iter().all(Match::is_valid) {
            return None;
        }
        Some(Self {
            draw_id: draw_id.into(),
            matches,
        })
    }
}

/// What a job is asked to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Discover the newest draw first.
    Auto,
    /// An explicit, site-defined draw identifier.
    Draw(String),
}

impl Target {
    /// Parse an optional query value; empty or `auto` means [`Target::Auto`].
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Target::Auto,
            Some(s) if s.eq_ignore_ascii_case(AUTO_KEY) => Target::Auto,
            Some(s) => Target::Draw(s.to_string()),
        }
    }

    /// Registry/cache key.
    pub fn key(&self) -> &str {
        match self {
            Target::Auto => AUTO_KEY,
            Target::Draw(id) => id,
        }
    }

    /// Mode label reported to callers.
    pub fn mode(&self) -> &'static str {
        match self {
            Target::Auto => "auto",
            Target::Draw(_) => "kohde",
        }
    }

    pub fn draw_id(&self) -> Option<&str> {
        match self {
            Target::Auto => None,
            Target::Draw(id) => Some(id),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Target::Auto)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
