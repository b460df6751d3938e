// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collectors for the four places a draw payload can hide.
//!
//! Each collector turns raw page material into parsed JSON documents
//! tagged with where they came from. Payloads that fail to parse are
//! counted and skipped.

use super::DebugSnapshot;
use crate::error::AcquisitionError;
use crate::renderer::RenderContext;
use scraper::{Html, Selector};
use serde_json::Value;
use std::fmt;

/// Payloads larger than this are ignored.
const MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Where a document was found. The `Display` form is the job's source tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawSource {
    /// Body of a response observed during navigation.
    Network { url: String },
    /// JSON embedded in a `<script>` element.
    InlineScript { label: String },
    /// A global in-page state object.
    GlobalState { key: String },
    /// A guessed REST path fetched from inside the page.
    RestProbe { path: String },
}

impl fmt::Display for DrawSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawSource::Network { url } => write!(f, "network:{}", short_url(url)),
            DrawSource::InlineScript { label } => write!(f, "script:{label}"),
            DrawSource::GlobalState { key } => write!(f, "global:{key}"),
            DrawSource::RestProbe { path } => write!(f, "rest:{path}"),
        }
    }
}

/// Path (and query) of a URL, or the raw string if it does not parse.
fn short_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(u) => match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

/// A parsed JSON document and its origin.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: DrawSource,
    pub document: Value,
}

/// Parse one payload, counting it as malformed on failure.
pub fn parse_payload(
    source: DrawSource,
    text: &str,
    debug: &mut DebugSnapshot,
) -> Option<SourceDocument> {
    let tag = source.to_string();
    if text.len() > MAX_PAYLOAD_BYTES {
        tracing::debug!("{tag}: payload of {} bytes skipped", text.len());
        return None;
    }
    debug.record_sample(&tag, text);
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(document) => Some(SourceDocument { source, document }),
        Err(e) => {
            let err = AcquisitionError::MalformedSource {
                source_tag: tag,
                reason: e.to_string(),
            };
            tracing::warn!("{err}");
            debug.record_malformed();
            None
        }
    }
}

/// (1) JSON bodies of responses captured since the last clear.
pub async fn network_documents(
    ctx: &dyn RenderContext,
    debug: &mut DebugSnapshot,
) -> Vec<SourceDocument> {
    ctx.captured_responses()
        .await
        .into_iter()
        .filter(|r| (200..300).contains(&r.status) && r.looks_like_json())
        .filter_map(|r| parse_payload(DrawSource::Network { url: r.url }, &r.body, debug))
        .collect()
}

/// (2) JSON inside `<script>` elements of the rendered page.
///
/// Covers typed JSON blocks (`application/json`, `application/ld+json`),
/// `script#__NEXT_DATA__`, and `window.__X__ = {...}` style assignments.
pub fn inline_script_documents(html: &str, debug: &mut DebugSnapshot) -> Vec<SourceDocument> {
    let Ok(selector) = Selector::parse("script") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for (i, el) in document.select(&selector).enumerate() {
        let text: String = el.text().collect();
        if text.trim().is_empty() {
            continue;
        }
        let id = el.value().attr("id").unwrap_or("");
        let kind = el.value().attr("type").unwrap_or("").to_ascii_lowercase();

        let label = if !id.is_empty() {
            id.to_string()
        } else if kind.contains("ld+json") {
            format!("ld+json#{i}")
        } else {
            format!("#{i}")
        };

        if kind.contains("json") || id == "__NEXT_DATA__" {
            if let Some(doc) = parse_payload(DrawSource::InlineScript { label }, &text, debug) {
                out.push(doc);
            }
            continue;
        }

        for (j, slice) in assigned_objects(&text).into_iter().enumerate() {
            let label = format!("{label}.{j}");
            if let Some(doc) = parse_payload(DrawSource::InlineScript { label }, slice, debug) {
                out.push(doc);
            }
        }
    }
    out
}

/// Object literals assigned to `window.__NAME__` globals in a script body.
fn assigned_objects(script: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = script;
    let mut offset = 0;
    while let Some(pos) = rest.find("window.__") {
        let start = offset + pos;
        let after = &script[start..];
        let Some(eq) = after.find('=') else { break };
        let value = after[eq + 1..].trim_start();
        let value_start = script.len() - value.len();
        if value.starts_with('{') {
            if let Some(len) = balanced_len(value) {
                out.push(&script[value_start..value_start + len]);
            }
        }
        offset = start + "window.__".len();
        rest = &script[offset..];
    }
    out
}

/// Byte length of the balanced `{...}` at the start of `s`, string-aware.
fn balanced_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Marker embedded in the global-state probe script.
pub const GLOBAL_PROBE_MARKER: &str = "__vakio_global_probe";

/// Marker embedded in REST probe scripts.
pub const REST_PROBE_MARKER: &str = "__vakio_rest_probe";

/// JS that serialises the named globals, cycle-safe and size-capped.
pub fn global_probe_script(keys: &[String]) -> String {
    let keys = serde_json::to_string(keys).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  /* {GLOBAL_PROBE_MARKER} */
  const out = {{}};
  for (const k of {keys}) {{
    const v = window[k];
    if (v === undefined || v === null) continue;
    try {{
      const seen = new WeakSet();
      const s = JSON.stringify(v, (_, val) => {{
        if (typeof val === 'object' && val !== null) {{
          if (seen.has(val)) return undefined;
          seen.add(val);
        }}
        return val;
      }});
      if (s && s.length <= {MAX_PAYLOAD_BYTES}) out[k] = s;
    }} catch (e) {{}}
  }}
  return out;
}})()"#
    )
}

/// (3) Global in-page state objects.
pub async fn global_state_documents(
    ctx: &dyn RenderContext,
    keys: &[String],
    debug: &mut DebugSnapshot,
) -> Vec<SourceDocument> {
    let found = match ctx.execute_js(&global_probe_script(keys)).await {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::debug!("global state probe failed: {e}");
            return Vec::new();
        }
    };

    // Keep the configured order rather than the object's key order.
    keys.iter()
        .filter_map(|key| {
            let source = DrawSource::GlobalState { key: key.clone() };
            match found.get(key)? {
                Value::String(text) => parse_payload(source, text, debug),
                Value::Null => None,
                other => Some(SourceDocument {
                    source,
                    document: other.clone(),
                }),
            }
        })
        .collect()
}

/// JS that fetches one same-origin path with credentials and returns the
/// body text, or null on any failure.
pub fn rest_probe_script(path: &str) -> String {
    let path = serde_json::to_string(path).unwrap_or_else(|_| "\"/\"".to_string());
    format!(
        r#"(async () => {{
  /* {REST_PROBE_MARKER} */
  try {{
    const r = await fetch({path}, {{
      credentials: 'include',
      headers: {{ accept: 'application/json' }}
    }});
    if (!r.ok) return null;
    return await r.text();
  }} catch (e) {{
    return null;
  }}
}})()"#
    )
}

/// (4) One guessed REST path, fetched from the page's own context.
pub async fn rest_probe_document(
    ctx: &dyn RenderContext,
    path: &str,
    debug: &mut DebugSnapshot,
) -> Option<SourceDocument> {
    let source = DrawSource::RestProbe {
        path: path.to_string(),
    };
    match ctx.execute_js(&rest_probe_script(path)).await {
        Ok(Value::String(text)) if !text.trim().is_empty() => parse_payload(source, &text, debug),
        Ok(document @ (Value::Object(_) | Value::Array(_))) => {
            Some(SourceDocument { source, document })
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("{source} failed: {e}");
            None
        }
    }
}
