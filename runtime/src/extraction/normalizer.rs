// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Normalizer: turns raw candidates into canonical [`Match`] records.
//!
//! Participants are resolved through the alias chains in this order:
//! direct fields (string or nested team object), a two-entry competitor
//! array, then a combined "Home - Away" event label.
//!
//! Outcomes map to symbols **by position**: the first three entries of
//! the outcome collection become `1`, `X`, `2`. Labels are not consulted,
//! so a source that reorders its outcomes is silently mismapped.
//! Candidates with fewer than three outcomes are dropped.

use super::aliases::{first_present, lookup, FieldAliases};
use super::candidates::RawCandidate;
use crate::draw::{Match, Outcome, OutcomeMap, DRAW_SIZE};
use serde_json::Value;

/// Decimal odds at or below this are not real prices.
pub const MIN_DECIMAL_ODDS: f64 = 1.0;

/// Normalize candidates in discovery order, keeping at most [`DRAW_SIZE`].
///
/// Only accepted matches consume an index, so indices are always `1..=n`
/// without gaps.
pub fn normalize(candidates: &[RawCandidate<'_>], aliases: &FieldAliases) -> Vec<Match> {
    let mut matches = Vec::with_capacity(DRAW_SIZE);

    for candidate in candidates {
        if matches.len() == DRAW_SIZE {
            break;
        }
        if let Some(mut m) = normalize_one(candidate, aliases) {
            m.index = matches.len() + 1;
            matches.push(m);
        }
    }

    matches
}

fn normalize_one(candidate: &RawCandidate<'_>, aliases: &FieldAliases) -> Option<Match> {
    let (home, away) = resolve_participants(candidate.object, aliases)?;

    let trio = candidate.outcomes.get(..3)?;

    let mut percent = OutcomeMap::new();
    let mut odds = OutcomeMap::new();
    for (symbol, entry) in Outcome::ALL.into_iter().zip(trio) {
        let pct = first_present(entry, &aliases.percent)
            .and_then(parse_number)
            .filter(|p| (0.0..=100.0).contains(p))
            .unwrap_or(0.0);
        percent.insert(symbol, pct);

        if let Some(o) = first_present(entry, &aliases.odds)
            .and_then(parse_number)
            .filter(|o| *o > MIN_DECIMAL_ODDS)
        {
            odds.insert(symbol, o);
        }
    }
    scale_fractions(&mut percent);

    let sum: f64 = percent.values().sum();
    if sum <= 0.0 {
        return None;
    }

    Some(Match {
        index: 0,
        home,
        away,
        percent,
        odds: (!odds.is_empty()).then_some(odds),
        odds_prob_pct: None,
        deviation: None,
    })
}

/// Some payloads carry shares as fractions (`0.45`) instead of percents.
fn scale_fractions(percent: &mut OutcomeMap) {
    let sum: f64 = percent.values().sum();
    if sum > 0.0 && sum <= 1.0 + 1e-6 {
        for v in percent.values_mut() {
            *v *= 100.0;
        }
    }
}

fn resolve_participants(obj: &Value, aliases: &FieldAliases) -> Option<(String, String)> {
    let home = resolve_name(obj, &aliases.home, aliases);
    let away = resolve_name(obj, &aliases.away, aliases);
    if let (Some(h), Some(a)) = (home, away) {
        return Some((h, a));
    }

    competitor_pair(obj, aliases).or_else(|| event_name_pair(obj, aliases))
}

fn resolve_name(obj: &Value, chain: &[String], aliases: &FieldAliases) -> Option<String> {
    chain
        .iter()
        .find_map(|alias| lookup(obj, alias).and_then(|v| name_of(v, aliases)))
}

/// A participant name from a string or a nested team object.
fn name_of(value: &Value, aliases: &FieldAliases) -> Option<String> {
    match value {
        Value::String(s) => clean_name(s, aliases.max_name_len),
        Value::Object(_) => aliases
            .team_name
            .iter()
            .find_map(|k| lookup(value, k)?.as_str())
            .and_then(|s| clean_name(s, aliases.max_name_len)),
        _ => None,
    }
}

fn competitor_pair(obj: &Value, aliases: &FieldAliases) -> Option<(String, String)> {
    aliases.competitors.iter().find_map(|alias| {
        let list = lookup(obj, alias)?.as_array()?;
        if list.len() < 2 {
            return None;
        }
        Some((name_of(&list[0], aliases)?, name_of(&list[1], aliases)?))
    })
}

fn event_name_pair(obj: &Value, aliases: &FieldAliases) -> Option<(String, String)> {
    aliases.event_name.iter().find_map(|alias| {
        let label = lookup(obj, alias)?.as_str()?;
        aliases.event_name_separators.iter().find_map(|sep| {
            let (h, a) = label.split_once(sep.as_str())?;
            Some((
                clean_name(h, aliases.max_name_len)?,
                clean_name(a, aliases.max_name_len)?,
            ))
        })
    })
}

fn clean_name(raw: &str, max_len: usize) -> Option<String> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() || name.chars().count() > max_len {
        return None;
    }
    Some(name)
}

/// Parse a JSON number or numeric string (`"45,5 %"`, `"2.10"`).
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
