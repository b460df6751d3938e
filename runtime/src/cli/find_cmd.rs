// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! `vakio find`: run discovery once and print the identifiers.

use super::{build_services, init_tracing, print_json};
use crate::config::RuntimeConfig;
use crate::renderer::chromium::LazyChromium;
use crate::renderer::Renderer;
use anyhow::{bail, Result};
use serde_json::json;
use std::sync::Arc;

pub async fn run(json_logs: bool) -> Result<()> {
    init_tracing(json_logs);

    let config = RuntimeConfig::from_env();
    let renderer: Arc<dyn Renderer> = Arc::new(LazyChromium::new(config.chromium_path.clone()));
    let services = build_services(&config, Arc::clone(&renderer))?;

    let identifiers = services.finder.find().await;
    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("browser shutdown failed: {e}");
    }

    if identifiers.is_empty() {
        bail!("no open draw identifiers found");
    }
    print_json(&json!({
        "ok": true,
        "kohde": identifiers[0],
        "identifiers": identifiers,
    }))
}
