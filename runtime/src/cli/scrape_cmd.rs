// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! `vakio scrape`: run one job in the foreground and print its snapshot.

use super::{build_services, init_tracing, print_json};
use crate::config::RuntimeConfig;
use crate::draw::Target;
use crate::renderer::chromium::LazyChromium;
use crate::renderer::fixture::FixtureRenderer;
use crate::renderer::Renderer;
use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Scrape `target` (auto when absent). With `fixture`, replay recorded
/// pages instead of launching a browser.
pub async fn run(target: Option<&str>, fixture: Option<&Path>, json_logs: bool) -> Result<()> {
    init_tracing(json_logs);

    let mut config = RuntimeConfig::from_env();
    let renderer: Arc<dyn Renderer> = match fixture {
        Some(path) => {
            // Nothing arrives late from a recording.
            config.settle = Duration::ZERO;
            Arc::new(FixtureRenderer::from_file(path)?)
        }
        None => Arc::new(LazyChromium::new(config.chromium_path.clone())),
    };
    let services = build_services(&config, Arc::clone(&renderer))?;

    let target = Target::parse(target);
    services.scheduler.kick(&target, true);
    services.scheduler.join(&target).await;
    let snapshot = services.scheduler.status(&target);

    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("browser shutdown failed: {e}");
    }

    print_json(&snapshot)?;
    if !snapshot.ok {
        bail!(
            "scrape of {target} failed: {}",
            snapshot.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
