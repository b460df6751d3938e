// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Candidate extractor: finds match-shaped objects in an arbitrary JSON tree.
//!
//! Breadth-first walk over the document. Known container subtrees
//! (`draw`, `games`, `rows`, ...) are queued ahead of the root so that
//! their contents are discovered first. An object becomes a candidate
//! when it carries an outcome collection; the walk does not descend
//! into a candidate (its nested market would otherwise be reported a
//! second time). Discovery stops at [`DRAW_SIZE`] candidates:
//! first-found wins, not best match.

use super::aliases::FieldAliases;
use crate::draw::DRAW_SIZE;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

/// An object suspected to represent one match.
#[derive(Debug, Clone, Copy)]
pub struct RawCandidate<'a> {
    /// The match-level object.
    pub object: &'a Value,
    /// Its outcome collection, in source order.
    pub outcomes: &'a [Value],
}

/// Find up to [`DRAW_SIZE`] candidates in discovery order.
pub fn extract<'a>(document: &'a Value, aliases: &FieldAliases) -> Vec<RawCandidate<'a>> {
    let mut queue: VecDeque<&'a Value> = VecDeque::new();

    if let Some(obj) = document.as_object() {
        for key in &aliases.container_objects {
            if let Some(v) = obj.get(key).filter(|v| v.is_object()) {
                queue.push_back(v);
            }
        }
        for key in &aliases.container_arrays {
            if let Some(v) = obj.get(key).filter(|v| v.is_array()) {
                queue.push_back(v);
            }
        }
    }
    queue.push_back(document);

    // Identity guard: a subtree queued as a seed is also reachable from the root.
    let mut visited: HashSet<*const Value> = HashSet::new();
    let mut found = Vec::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node as *const Value) {
            continue;
        }

        match node {
            Value::Object(map) => {
                if let Some(outcomes) = aliases.outcome_collection(node) {
                    found.push(RawCandidate {
                        object: node,
                        outcomes,
                    });
                    if found.len() >= DRAW_SIZE {
                        break;
                    }
                    continue;
                }
                queue.extend(map.values().filter(|v| is_container(v)));
            }
            Value::Array(items) => {
                queue.extend(items.iter().filter(|v| is_container(v)));
            }
            _ => {}
        }
    }

    found
}

fn is_container(v: &Value) -> bool {
    v.is_object() || v.is_array()
}
