// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Enrichment: implied probabilities and public-vs-price deviation.
//!
//! For each match with odds, `implied = 1 / odds` per symbol, then the
//! bookmaker margin is removed proportionally so the implied values sum
//! to 100. `deviation = percent - oddsProbPct`. Derived fields are always
//! recomputed from `percent`/`odds`, so enriching twice is a no-op.

use crate::draw::{Match, OutcomeMap};

/// Odds at or below this cannot be inverted meaningfully.
const ODDS_EPSILON: f64 = 1e-9;

/// Enrich every match. Never fails; matches without usable odds get no
/// derived fields.
pub fn enrich(matches: Vec<Match>) -> Vec<Match> {
    matches.into_iter().map(enrich_match).collect()
}

/// Enrich a single match.
pub fn enrich_match(mut m: Match) -> Match {
    let (prob, dev) = match m.odds.as_ref().and_then(implied_probabilities) {
        Some(prob) => {
            let dev: OutcomeMap = prob
                .iter()
                .map(|(symbol, p)| {
                    let pct = m.percent.get(symbol).copied().unwrap_or(0.0);
                    (*symbol, pct - p)
                })
                .collect();
            (Some(prob), Some(dev))
        }
        None => (None, None),
    };
    m.odds_prob_pct = prob;
    m.deviation = dev;
    m
}

/// Margin-normalized implied probability (percent) per symbol with odds.
///
/// Returns `None` when no symbol has invertible odds.
pub fn implied_probabilities(odds: &OutcomeMap) -> Option<OutcomeMap> {
    let implied: OutcomeMap = odds
        .iter()
        .filter(|(_, o)| o.is_finite() && **o > ODDS_EPSILON)
        .map(|(symbol, o)| (*symbol, 1.0 / o))
        .collect();

    let total: f64 = implied.values().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    Some(
        implied
            .into_iter()
            .map(|(symbol, p)| (symbol, p / total * 100.0))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::Outcome;

    fn with_odds(percent: [f64; 3], odds: Option<[f64; 3]>) -> Match {
        let map = |v: [f64; 3]| -> OutcomeMap { Outcome::ALL.into_iter().zip(v).collect() };
        Match {
            index: 1,
            home: "A".into(),
            away: "B".into(),
            percent: map(percent),
            odds: odds.map(map),
            odds_prob_pct: None,
            deviation: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_even_split_scenario() {
        let m = enrich_match(with_odds([60.0, 20.0, 20.0], Some([2.0, 4.0, 4.0])));
        let p = m.odds_prob_pct.as_ref().unwrap();
        assert!(approx(p[&Outcome::Home], 50.0));
        assert!(approx(p[&Outcome::Draw], 25.0));
        assert!(approx(p[&Outcome::Away], 25.0));

        let d = m.deviation.as_ref().unwrap();
        assert!(approx(d[&Outcome::Home], 10.0));
        assert!(approx(d[&Outcome::Draw], -5.0));
        assert!(approx(d[&Outcome::Away], -5.0));
    }

    #[test]
    fn test_margin_removed_sums_to_hundred() {
        let m = enrich_match(with_odds([40.0, 30.0, 30.0], Some([1.85, 3.4, 4.1])));
        let sum: f64 = m.odds_prob_pct.unwrap().values().sum();
        assert!((sum - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_odds_leaves_fields_empty() {
        let m = enrich_match(with_odds([40.0, 30.0, 30.0], None));
        assert!(m.odds_prob_pct.is_none());
        assert!(m.deviation.is_none());
    }

    #[test]
    fn test_zero_odds_total_is_not_an_error() {
        let m = enrich_match(with_odds([40.0, 30.0, 30.0], Some([0.0, 0.0, 0.0])));
        assert!(m.odds_prob_pct.is_none());
        assert!(m.deviation.is_none());
    }

    #[test]
    fn test_partial_odds_normalize_over_present_symbols() {
        let mut m = with_odds([50.0, 25.0, 25.0], None);
        m.odds = Some(OutcomeMap::from([(Outcome::Home, 2.0), (Outcome::Away, 2.0)]));
        let m = enrich_match(m);
        let p = m.odds_prob_pct.unwrap();
        assert_eq!(p.len(), 2);
        assert!(approx(p[&Outcome::Home], 50.0));
        assert!(!p.contains_key(&Outcome::Draw));
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let once = enrich(vec![
            with_odds([55.0, 25.0, 20.0], Some([1.7, 3.8, 5.0])),
            with_odds([33.0, 33.0, 34.0], None),
        ]);
        let twice = enrich(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_stale_derived_fields_are_cleared() {
        let mut m = enrich_match(with_odds([40.0, 30.0, 30.0], Some([2.0, 3.0, 4.0])));
        m.odds = None;
        let m = enrich_match(m);
        assert!(m.odds_prob_pct.is_none());
        assert!(m.deviation.is_none());
    }
}
