// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `vakio` binary, plus the wiring
//! they share.

pub mod find_cmd;
pub mod scrape_cmd;
pub mod serve;

use crate::acquisition::discovery::{DrawDiscovery, IdentifierFinder};
use crate::acquisition::http_client::HttpClient;
use crate::acquisition::strategy::{AcquisitionSettings, DrawAcquirer};
use crate::config::RuntimeConfig;
use crate::events::EventBus;
use crate::extraction::aliases::FieldAliases;
use crate::jobs::runner::BrowserJobRunner;
use crate::jobs::{JobScheduler, SchedulerSettings};
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

/// The long-lived pieces of a running process.
pub struct Services {
    pub scheduler: JobScheduler,
    pub finder: IdentifierFinder,
    pub events: Arc<EventBus>,
    pub renderer: Arc<dyn Renderer>,
}

/// Wire scheduler, runner and discovery around one renderer.
pub fn build_services(config: &RuntimeConfig, renderer: Arc<dyn Renderer>) -> Result<Services> {
    let aliases = FieldAliases::load(config.aliases_file.as_deref())
        .context("failed to load field aliases")?;
    let events = Arc::new(EventBus::default());
    let discovery = DrawDiscovery::new(config.site.clone(), config.discovery_timeout_ms)?;

    let acquirer = DrawAcquirer::new(AcquisitionSettings::from(config), Arc::new(aliases));
    let runner = BrowserJobRunner::new(
        Arc::clone(&renderer),
        acquirer,
        discovery.clone(),
        Arc::clone(&events),
    );
    let scheduler = JobScheduler::new(
        Arc::new(runner),
        Arc::clone(&events),
        SchedulerSettings {
            cache_ttl: config.cache_ttl,
            max_sessions: config.max_sessions,
            attempts: config.job_attempts,
        },
    );
    let finder = IdentifierFinder::new(
        Arc::clone(&renderer),
        discovery,
        HttpClient::new(config.discovery_timeout_ms),
        Arc::clone(&events),
    );

    Ok(Services {
        scheduler,
        finder,
        events,
        renderer,
    })
}

/// Install the global tracing subscriber (stderr, env-filterable).
pub fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vakio_runtime=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A second init (tests, repeated calls) is harmless.
    let _ = if json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
