// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run the REST server and maintenance loop until Ctrl-C/SIGTERM.

use super::{build_services, init_tracing};
use crate::config::RuntimeConfig;
use crate::maintenance::{self, MaintenanceConfig};
use crate::renderer::chromium::LazyChromium;
use crate::renderer::Renderer;
use crate::rest::{self, AppState};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Start serving. `port` overrides `PORT`.
pub async fn run(port: Option<u16>, json_logs: bool) -> Result<()> {
    init_tracing(json_logs);

    let mut config = RuntimeConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    info!("starting vakio v{}", env!("CARGO_PKG_VERSION"));

    // The listener comes up first; Chromium launches on the first job.
    let renderer: Arc<dyn Renderer> = Arc::new(LazyChromium::new(config.chromium_path.clone()));
    let services = build_services(&config, Arc::clone(&renderer))?;

    let shutdown = Arc::new(Notify::new());
    let maintenance = maintenance::spawn(
        services.scheduler.clone(),
        MaintenanceConfig::from(&config),
        Arc::clone(&shutdown),
    );

    let state = Arc::new(AppState {
        scheduler: services.scheduler,
        finder: services.finder,
        events: services.events,
        renderer: Arc::clone(&renderer),
        started_at: Instant::now(),
    });

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.bind_host, config.port))?;

    let result = rest::serve(addr, state, shutdown_signal()).await;

    shutdown.notify_one();
    if let Err(e) = maintenance.await {
        warn!("maintenance task ended abnormally: {e}");
    }
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e}");
    }
    info!("vakio stopped");

    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received shutdown signal");
}
