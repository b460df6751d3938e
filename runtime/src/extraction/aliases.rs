// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Field alias table for heuristic match extraction.
//!
//! The site's JSON has no published schema, so every logical field
//! (participants, percentages, odds, outcome collections) is resolved
//! through an ordered alias list: the first alias that yields a usable
//! value wins. Defaults are embedded at compile time from
//! `field_aliases.json`; an operator file (`VAKIO_ALIASES_FILE`) can
//! replace any individual list without touching acquisition code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Embedded default alias table.
const DEFAULT_ALIASES_JSON: &str = include_str!("field_aliases.json");

/// Ordered alias lists per logical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAliases {
    /// Top-level keys holding a single high-probability subtree.
    pub container_objects: Vec<String>,
    /// Top-level keys holding arrays of likely matches.
    pub container_arrays: Vec<String>,
    /// Paths (dot-separated) to an outcome collection inside a match object.
    pub outcome_collections: Vec<String>,
    pub home: Vec<String>,
    pub away: Vec<String>,
    /// Name keys inside a nested team/competitor object.
    pub team_name: Vec<String>,
    /// Keys holding a two-entry `[home, away]` participant array.
    pub competitors: Vec<String>,
    /// Keys holding a combined "Home - Away" label.
    pub event_name: Vec<String>,
    pub event_name_separators: Vec<String>,
    pub percent: Vec<String>,
    pub odds: Vec<String>,
    /// Upper bound on participant name length (longer strings are garbage).
    pub max_name_len: usize,
}

/// Partial table read from an operator file; present lists replace defaults.
#[derive(Debug, Default, Deserialize)]
struct AliasOverride {
    container_objects: Option<Vec<String>>,
    container_arrays: Option<Vec<String>>,
    outcome_collections: Option<Vec<String>>,
    home: Option<Vec<String>>,
    away: Option<Vec<String>>,
    team_name: Option<Vec<String>>,
    competitors: Option<Vec<String>>,
    event_name: Option<Vec<String>>,
    event_name_separators: Option<Vec<String>>,
    percent: Option<Vec<String>>,
    odds: Option<Vec<String>>,
    max_name_len: Option<usize>,
}

impl FieldAliases {
    /// The embedded default table.
    pub fn builtin() -> Self {
        serde_json::from_str(DEFAULT_ALIASES_JSON).unwrap_or_else(|e| {
            tracing::error!("embedded alias table is invalid: {e}");
            Self::empty()
        })
    }

    fn empty() -> Self {
        Self {
            container_objects: Vec::new(),
            container_arrays: Vec::new(),
            outcome_collections: Vec::new(),
            home: Vec::new(),
            away: Vec::new(),
            team_name: Vec::new(),
            competitors: Vec::new(),
            event_name: Vec::new(),
            event_name_separators: Vec::new(),
            percent: Vec::new(),
            odds: Vec::new(),
            max_name_len: 60,
        }
    }

    /// Load the embedded table, merging an optional operator file over it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut aliases = Self::builtin();
        let Some(path) = path else {
            return Ok(aliases);
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read alias file: {}", path.display()))?;
        let patch: AliasOverride = serde_json::from_str(&raw)
            .with_context(|| format!("invalid alias file: {}", path.display()))?;
        aliases.apply(patch);

        tracing::info!("loaded field aliases from {}", path.display());
        Ok(aliases)
    }

    fn apply(&mut self, patch: AliasOverride) {
        fn set(slot: &mut Vec<String>, value: Option<Vec<String>>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut self.container_objects, patch.container_objects);
        set(&mut self.container_arrays, patch.container_arrays);
        set(&mut self.outcome_collections, patch.outcome_collections);
        set(&mut self.home, patch.home);
        set(&mut self.away, patch.away);
        set(&mut self.team_name, patch.team_name);
        set(&mut self.competitors, patch.competitors);
        set(&mut self.event_name, patch.event_name);
        set(&mut self.event_name_separators, patch.event_name_separators);
        set(&mut self.percent, patch.percent);
        set(&mut self.odds, patch.odds);
        if let Some(n) = patch.max_name_len {
            self.max_name_len = n.max(1);
        }
    }

    /// Whether `value` is an object carrying any percent or odds alias.
    pub fn is_outcome_like(&self, value: &Value) -> bool {
        value.is_object()
            && (first_present(value, &self.percent).is_some()
                || first_present(value, &self.odds).is_some())
    }

    /// The first outcome collection of `obj` that holds outcome-like entries.
    pub fn outcome_collection<'a>(&self, obj: &'a Value) -> Option<&'a [Value]> {
        self.outcome_collections.iter().find_map(|path| {
            let arr = lookup(obj, path)?.as_array()?;
            arr.iter()
                .any(|entry| self.is_outcome_like(entry))
                .then_some(arr.as_slice())
        })
    }
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Resolve a dot-separated path (`market.outcomes`) inside an object.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |cur, segment| cur.as_object()?.get(segment))
        .filter(|v| !v.is_null())
}

/// First alias path present (non-null) on `value`.
pub fn first_present<'a>(value: &'a Value, aliases: &[String]) -> Option<&'a Value> {
    aliases.iter().find_map(|a| lookup(value, a))
}
