// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Result cache: the last successful draw per key with a freshness window.
//!
//! Stale entries are ignored on read, not removed; the maintenance loop
//! sweeps them out. Writes overwrite unconditionally.

use crate::draw::Draw;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A successful outcome worth serving again.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDraw {
    /// The concrete identifier the draw belongs to.
    pub draw_id: String,
    pub draw: Draw,
    pub source_tag: String,
    pub updated_at: DateTime<Utc>,
}

struct CacheEntry {
    payload: CachedDraw,
    created_at: Instant,
}

impl CacheEntry {
    fn is_fresh_at(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

/// TTL cache keyed by target key.
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// The entry for `key` if it is still fresh.
    pub fn get(&self, key: &str) -> Option<CachedDraw> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<CachedDraw> {
        self.entries
            .get(key)
            .filter(|e| e.is_fresh_at(self.ttl, now))
            .map(|e| e.payload.clone())
    }

    /// Store `payload` under `key`, replacing whatever was there.
    pub fn put(&self, key: &str, payload: CachedDraw) {
        self.insert_at(key, payload, Instant::now());
    }

    fn insert_at(&self, key: &str, payload: CachedDraw, created_at: Instant) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                created_at,
            },
        );
    }

    /// Physically remove stale entries. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        // Counted inside retain: concurrent puts may grow the map meanwhile.
        let mut removed = 0;
        self.entries.retain(|_, e| {
            let keep = e.is_fresh_at(self.ttl, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Entries held, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
