// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! The seam between the scheduler and the browser.

use crate::acquisition::discovery::DrawDiscovery;
use crate::acquisition::strategy::DrawAcquirer;
use crate::acquisition::DebugSnapshot;
use crate::draw::{Draw, Target};
use crate::error::AcquisitionError;
use crate::events::{DrawEvent, EventBus};
use crate::renderer::{RenderContext, Renderer};
use async_trait::async_trait;
use std::sync::Arc;

/// A complete draw from one attempt.
#[derive(Debug, Clone)]
pub struct RunSuccess {
    pub draw_id: String,
    pub draw: Draw,
    pub source_tag: String,
    pub debug: DebugSnapshot,
}

/// A failed attempt, with whatever diagnostics it gathered.
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub error: AcquisitionError,
    pub draw_id: Option<String>,
    pub debug: DebugSnapshot,
}

impl RunFailure {
    pub fn new(error: AcquisitionError, draw_id: Option<String>) -> Self {
        Self {
            error,
            draw_id,
            debug: DebugSnapshot::default(),
        }
    }
}

/// Performs exactly one acquisition attempt for a target.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, target: &Target) -> Result<RunSuccess, RunFailure>;
}

/// Production runner: one exclusive browser context per attempt.
pub struct BrowserJobRunner {
    renderer: Arc<dyn Renderer>,
    acquirer: DrawAcquirer,
    discovery: DrawDiscovery,
    events: Arc<EventBus>,
}

impl BrowserJobRunner {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        acquirer: DrawAcquirer,
        discovery: DrawDiscovery,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            renderer,
            acquirer,
            discovery,
            events,
        }
    }

    async fn run_in(
        &self,
        ctx: &mut dyn RenderContext,
        target: &Target,
        debug: &mut DebugSnapshot,
    ) -> Result<RunSuccess, (AcquisitionError, Option<String>)> {
        let draw_id = match target {
            Target::Draw(id) => id.clone(),
            Target::Auto => {
                let found = self.discovery.discover(ctx).await;
                self.events.emit(DrawEvent::DiscoveryCompleted {
                    identifiers: found.len(),
                    newest: found.first().cloned(),
                });
                match found.into_iter().next() {
                    Some(id) => id,
                    None => return Err((AcquisitionError::DiscoveryEmpty, None)),
                }
            }
        };

        match self.acquirer.acquire(ctx, &draw_id, debug).await {
            Ok(acquired) => Ok(RunSuccess {
                source_tag: acquired.source.to_string(),
                draw: acquired.draw,
                draw_id,
                debug: std::mem::take(debug),
            }),
            Err(e) => Err((e, Some(draw_id))),
        }
    }
}

#[async_trait]
impl JobRunner for BrowserJobRunner {
    async fn run(&self, target: &Target) -> Result<RunSuccess, RunFailure> {
        let mut ctx = match self.renderer.new_context().await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!("browser unavailable: {e:#}");
                return Err(RunFailure::new(
                    AcquisitionError::DriverLaunchFailure(e.to_string()),
                    target.draw_id().map(String::from),
                ));
            }
        };

        let mut debug = DebugSnapshot::default();
        let result = self.run_in(ctx.as_mut(), target, &mut debug).await;

        if let Err(e) = ctx.close().await {
            tracing::debug!("context close failed: {e}");
        }

        result.map_err(|(error, draw_id)| RunFailure {
            error,
            draw_id,
            debug,
        })
    }
}
