// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Background maintenance loop.
//!
//! Sweeps stale cache payloads, forgets idle explicit-identifier keys and,
//! when configured, refreshes the auto draw on a fixed period.

use crate::config::RuntimeConfig;
use crate::draw::Target;
use crate::jobs::JobScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub tick_every: Duration,
    pub state_retention: Duration,
    /// `None` disables the periodic auto kick.
    pub auto_refresh: Option<Duration>,
}

impl From<&RuntimeConfig> for MaintenanceConfig {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            tick_every: config.sweep_every,
            state_retention: config.state_retention,
            auto_refresh: config.auto_refresh,
        }
    }
}

/// Result of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepResult {
    pub expired_payloads: usize,
    pub pruned_keys: usize,
}

/// One cleanup pass.
pub fn sweep(scheduler: &JobScheduler, retention: Duration) -> SweepResult {
    let result = SweepResult {
        expired_payloads: scheduler.sweep_cache(),
        pruned_keys: scheduler.prune_idle(retention),
    };
    if result.expired_payloads > 0 || result.pruned_keys > 0 {
        tracing::info!(
            "maintenance removed {} expired payload(s), {} idle key(s)",
            result.expired_payloads,
            result.pruned_keys
        );
    }
    result
}

/// Spawn background maintenance until shutdown is signaled.
pub fn spawn(
    scheduler: JobScheduler,
    cfg: MaintenanceConfig,
    shutdown: Arc<Notify>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "maintenance loop started: tick={}s retention={}s auto_refresh={}",
            cfg.tick_every.as_secs(),
            cfg.state_retention.as_secs(),
            cfg.auto_refresh
                .map(|d| format!("{}s", d.as_secs()))
                .unwrap_or_else(|| "off".to_string())
        );
        let mut ticker = tokio::time::interval(cfg.tick_every);
        // Far-future placeholder keeps the select arm inert when refresh is off.
        let mut refresher =
            tokio::time::interval(cfg.auto_refresh.unwrap_or(Duration::from_secs(86_400 * 365)));

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("maintenance loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    sweep(&scheduler, cfg.state_retention);
                }
                _ = refresher.tick(), if cfg.auto_refresh.is_some() => {
                    let receipt = scheduler.kick(&Target::Auto, false);
                    tracing::debug!("periodic auto refresh: {}", receipt.message());
                }
            }
        }
    })
}
