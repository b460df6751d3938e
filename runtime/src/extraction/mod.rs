// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pure extraction pipeline: JSON document → candidates → matches → draw.
//!
//! Nothing in this module performs I/O. Acquisition feeds it one
//! document per source and asks whether a complete draw came out.

pub mod aliases;
pub mod candidates;
pub mod enrichment;
pub mod normalizer;

use crate::draw::{Draw, DRAW_SIZE};
use aliases::FieldAliases;
use serde_json::Value;

/// Result of scanning one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Exactly 13 valid, enriched matches.
    Complete(Draw),
    /// Fewer than 13 matches normalized; the count is kept for diagnostics.
    Partial(usize),
}

/// Run extractor, normalizer and enrichment over one document.
pub fn scan_document(document: &Value, draw_id: &str, aliases: &FieldAliases) -> ScanOutcome {
    let found = candidates::extract(document, aliases);
    let matches = normalizer::normalize(&found, aliases);
    if matches.len() != DRAW_SIZE {
        return ScanOutcome::Partial(matches.len());
    }

    match Draw::new(draw_id, enrichment::enrich(matches)) {
        Some(draw) => ScanOutcome::Complete(draw),
        None => ScanOutcome::Partial(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn games(n: usize) -> Value {
        let list: Vec<Value> = (1..=n)
            .map(|i| {
                json!({
                    "homeName": format!("H{i}"),
                    "awayName": format!("A{i}"),
                    "choices": [
                        {"percentage": 40, "odds": 2.0},
                        {"percentage": 30, "odds": 4.0},
                        {"percentage": 30, "odds": 4.0}
                    ]
                })
            })
            .collect();
        json!({"draws": [{"id": "a_1", "rows": list}]})
    }

    #[test]
    fn test_complete_draw_is_enriched() {
        match scan_document(&games(13), "a_1", &FieldAliases::builtin()) {
            ScanOutcome::Complete(draw) => {
                assert_eq!(draw.draw_id, "a_1");
                assert_eq!(draw.matches.len(), 13);
                assert!(draw.matches.iter().all(|m| m.odds_prob_pct.is_some()));
            }
            other => panic!("expected complete draw, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_never_surfaces_as_draw() {
        for n in [0, 1, 7, 12] {
            assert_eq!(
                scan_document(&games(n), "a_1", &FieldAliases::builtin()),
                ScanOutcome::Partial(n)
            );
        }
    }

    #[test]
    fn test_more_than_thirteen_truncates_to_draw() {
        assert!(matches!(
            scan_document(&games(16), "a_1", &FieldAliases::builtin()),
            ScanOutcome::Complete(_)
        ));
    }
}
