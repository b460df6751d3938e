// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

//! Job scheduler and dedup registry.
//!
//! At most one job runs per key. The IDLE → RUNNING transition happens
//! under the key's map entry lock, before the task is spawned, so two
//! near-simultaneous kicks can never both start work.

use super::cache::{CachedDraw, ResultCache};
use super::runner::{JobRunner, RunFailure, RunSuccess};
use super::state::{JobSnapshot, JobState};
use crate::draw::{Target, AUTO_KEY};
use crate::error::AcquisitionError;
use crate::events::{now_timestamp, DrawEvent, EventBus};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What a kick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KickReceipt {
    pub accepted: bool,
    pub already_running: bool,
    pub reused_cache: bool,
    pub mode: &'static str,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl KickReceipt {
    pub fn message(&self) -> &'static str {
        if self.already_running {
            "Job already running"
        } else if self.reused_cache {
            "Using cached result"
        } else {
            "Job started"
        }
    }
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cache_ttl: Duration,
    pub max_sessions: usize,
    /// Attempts per job, counting the first.
    pub attempts: u32,
}

struct Inner {
    states: DashMap<String, JobState>,
    cache: ResultCache,
    handles: DashMap<String, JoinHandle<()>>,
    runner: Arc<dyn JobRunner>,
    sessions: Arc<Semaphore>,
    events: Arc<EventBus>,
    attempts: u32,
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        events: Arc<EventBus>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                states: DashMap::new(),
                cache: ResultCache::new(settings.cache_ttl),
                handles: DashMap::new(),
                runner,
                sessions: Arc::new(Semaphore::new(settings.max_sessions.max(1))),
                events,
                attempts: settings.attempts.max(1),
            }),
        }
    }

    /// Start a job for `target` unless one is running or a fresh result
    /// exists (and `force` is false). Never blocks on the job itself.
    pub fn kick(&self, target: &Target, force: bool) -> KickReceipt {
        let key = target.key().to_string();
        let mut receipt = KickReceipt {
            accepted: false,
            already_running: false,
            reused_cache: false,
            mode: target.mode(),
            target: key.clone(),
            run_id: None,
        };

        let mut state = self
            .inner
            .states
            .entry(key.clone())
            .or_insert_with(JobState::new);

        if state.in_progress {
            receipt.already_running = true;
            return receipt;
        }

        if !force {
            if let Some(cached) = self.inner.cache.get(&key) {
                state.apply_success(&cached, None);
                drop(state);
                tracing::debug!("{key}: serving cached draw {}", cached.draw_id);
                self.inner.events.emit(DrawEvent::JobReused {
                    key,
                    draw_id: cached.draw_id,
                    timestamp: now_timestamp(),
                });
                receipt.reused_cache = true;
                return receipt;
            }
        }

        let run_id = Uuid::new_v4();
        state.begin(run_id);

        tracing::info!("{key}: job {run_id} started (force={force})");
        self.inner.events.emit(DrawEvent::JobStarted {
            key: key.clone(),
            run_id: run_id.to_string(),
            mode: target.mode().to_string(),
            timestamp: now_timestamp(),
        });

        // Spawned while the entry is still held so a fast job cannot
        // finish and be replaced before its handle is stored.
        let handle = tokio::spawn(self.clone().run_job(target.clone(), run_id));
        self.inner.handles.insert(key, handle);
        drop(state);

        receipt.accepted = true;
        receipt.run_id = Some(run_id.to_string());
        receipt
    }

    /// Current view of `target`'s key. Never waits on a running job.
    pub fn status(&self, target: &Target) -> JobSnapshot {
        match self.inner.states.get(target.key()) {
            Some(state) => state.snapshot(target),
            None => JobState::new().snapshot(target),
        }
    }

    /// Wait for the job last started for `target`, if any.
    pub async fn join(&self, target: &Target) {
        let Some((_, handle)) = self.inner.handles.remove(target.key()) else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::error!("{}: job task ended abnormally: {e}", target.key());
        }
    }

    /// Number of keys currently running.
    pub fn running_jobs(&self) -> usize {
        self.inner.states.iter().filter(|s| s.in_progress).count()
    }

    /// Drop stale cache payloads. Returns how many were removed.
    pub fn sweep_cache(&self) -> usize {
        self.inner.cache.sweep_expired()
    }

    /// Forget idle explicit-identifier keys untouched for `retention`.
    /// The auto key is never pruned.
    pub fn prune_idle(&self, retention: Duration) -> usize {
        let mut pruned = 0;
        self.inner.states.retain(|key, state| {
            let keep =
                key == AUTO_KEY || state.in_progress || state.touched.elapsed() < retention;
            if !keep {
                pruned += 1;
            }
            keep
        });
        self.inner.handles.retain(|_, h| !h.is_finished());
        pruned
    }

    /// Keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.inner.states.len()
    }

    async fn run_job(self, target: Target, run_id: Uuid) {
        let key = target.key().to_string();
        let guard = RunGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            run_id,
            armed: true,
        };
        let started = Instant::now();

        let permit = Arc::clone(&self.inner.sessions).acquire_owned().await;
        let (outcome, attempts) = match permit {
            Ok(_permit) => self.run_with_retry(&target, run_id).await,
            Err(_) => (
                Err(RunFailure::new(
                    AcquisitionError::DriverLaunchFailure("session pool closed".to_string()),
                    target.draw_id().map(String::from),
                )),
                0,
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(success) => self.finish_success(&target, run_id, success, attempts, elapsed_ms),
            Err(failure) => self.finish_failure(&target, run_id, failure, attempts, elapsed_ms),
        }
        guard.disarm();
    }

    async fn run_with_retry(
        &self,
        target: &Target,
        run_id: Uuid,
    ) -> (Result<RunSuccess, RunFailure>, u32) {
        let mut attempt = 1;
        loop {
            match self.inner.runner.run(target).await {
                Ok(success) => return (Ok(success), attempt),
                Err(failure)
                    if attempt < self.inner.attempts && failure.error.is_retryable() =>
                {
                    tracing::warn!(
                        "{}: job {run_id} attempt {attempt} failed: {}; retrying",
                        target.key(),
                        failure.error
                    );
                    attempt += 1;
                }
                Err(failure) => return (Err(failure), attempt),
            }
        }
    }

    fn finish_success(
        &self,
        target: &Target,
        run_id: Uuid,
        success: RunSuccess,
        attempts: u32,
        elapsed_ms: u64,
    ) {
        let key = target.key();
        let cached = CachedDraw {
            draw_id: success.draw_id,
            draw: success.draw,
            source_tag: success.source_tag,
            updated_at: Utc::now(),
        };

        self.inner.cache.put(key, cached.clone());
        if let Some(mut state) = self.inner.states.get_mut(key) {
            state.apply_success(&cached, Some(success.debug));
        }

        // The concrete key gets the same result unless it has its own job.
        if target.is_auto() && cached.draw_id != key {
            self.inner.cache.put(&cached.draw_id, cached.clone());
            let mut concrete = self
                .inner
                .states
                .entry(cached.draw_id.clone())
                .or_insert_with(JobState::new);
            if !concrete.in_progress {
                concrete.apply_success(&cached, None);
            }
        }

        tracing::info!(
            "{key}: job {run_id} succeeded via {} in {elapsed_ms}ms (draw {})",
            cached.source_tag,
            cached.draw_id
        );
        self.inner.events.emit(DrawEvent::JobSucceeded {
            key: key.to_string(),
            run_id: run_id.to_string(),
            draw_id: cached.draw_id,
            source_tag: cached.source_tag,
            attempts,
            elapsed_ms,
        });
    }

    fn finish_failure(
        &self,
        target: &Target,
        run_id: Uuid,
        failure: RunFailure,
        attempts: u32,
        elapsed_ms: u64,
    ) {
        let key = target.key();
        if let Some(mut state) = self.inner.states.get_mut(key) {
            state.apply_failure(&failure.error, failure.draw_id, failure.debug);
        }

        tracing::warn!("{key}: job {run_id} failed after {attempts} attempt(s): {}", failure.error);
        self.inner.events.emit(DrawEvent::JobFailed {
            key: key.to_string(),
            run_id: run_id.to_string(),
            error: failure.error.to_string(),
            code: failure.error.code().to_string(),
            attempts,
            elapsed_ms,
        });
    }
}

/// Releases the key if a job task unwinds before recording its outcome.
struct RunGuard {
    inner: Arc<Inner>,
    key: String,
    run_id: Uuid,
    armed: bool,
}

impl RunGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(mut state) = self.inner.states.get_mut(&self.key) {
            if state.run_id == Some(self.run_id) {
                state.in_progress = false;
                state.last_error = Some("job aborted".to_string());
                state.error_code = None;
                state.updated_at = Some(Utc::now());
            }
        }
        tracing::error!("{}: job {} aborted", self.key, self.run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::DebugSnapshot;
    use crate::draw::{Draw, Match, Outcome, OutcomeMap, DRAW_SIZE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn draw(id: &str) -> Draw {
        let percent: OutcomeMap = Outcome::ALL.iter().map(|o| (*o, 30.0)).collect();
        let matches = (1..=DRAW_SIZE)
            .map(|i| Match {
                index: i,
                home: format!("H{i}"),
                away: format!("A{i}"),
                percent: percent.clone(),
                odds: None,
                odds_prob_pct: None,
                deviation: None,
            })
            .collect();
        Draw::new(id, matches).unwrap()
    }

    /// Counts runs; optionally parks until released; fails the first
    /// `fail_first` runs with `error`.
    struct FakeRunner {
        runs: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail_first: usize,
        error: AcquisitionError,
        panic: bool,
    }

    impl FakeRunner {
        fn ok() -> Self {
            Self {
                runs: AtomicUsize::new(0),
                gate: None,
                fail_first: 0,
                error: AcquisitionError::DiscoveryEmpty,
                panic: false,
            }
        }
    }

    #[async_trait]
    impl JobRunner for FakeRunner {
        async fn run(&self, target: &Target) -> Result<RunSuccess, RunFailure> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.panic {
                panic!("runner blew up");
            }
            let draw_id = target.draw_id().unwrap_or("a_100522").to_string();
            if n < self.fail_first {
                return Err(RunFailure::new(self.error.clone(), Some(draw_id)));
            }
            Ok(RunSuccess {
                draw: draw(&draw_id),
                draw_id,
                source_tag: "network:/api/fake".to_string(),
                debug: DebugSnapshot::default(),
            })
        }
    }

    fn scheduler(runner: Arc<FakeRunner>, attempts: u32) -> JobScheduler {
        JobScheduler::new(
            runner,
            Arc::new(EventBus::default()),
            SchedulerSettings {
                cache_ttl: Duration::from_secs(1800),
                max_sessions: 2,
                attempts,
            },
        )
    }

    #[tokio::test]
    async fn test_concurrent_kicks_run_once() {
        let gate = Arc::new(Notify::new());
        let runner = Arc::new(FakeRunner {
            gate: Some(gate.clone()),
            ..FakeRunner::ok()
        });
        let sched = scheduler(runner.clone(), 1);
        let target = Target::Draw("a_1".to_string());

        let first = sched.kick(&target, false);
        let second = sched.kick(&target, true);
        assert!(first.accepted);
        assert!(!second.accepted);
        assert!(second.already_running);
        assert!(sched.status(&target).in_progress);

        // Let the task reach the gate before releasing it.
        tokio::task::yield_now().await;
        gate.notify_one();
        sched.join(&target).await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
        let snap = sched.status(&target);
        assert!(snap.ok);
        assert!(!snap.in_progress);
        assert_eq!(snap.source_tag.as_deref(), Some("network:/api/fake"));
    }

    #[tokio::test]
    async fn test_fresh_cache_is_reused_unless_forced() {
        let runner = Arc::new(FakeRunner::ok());
        let sched = scheduler(runner.clone(), 1);
        let target = Target::Draw("a_1".to_string());

        assert!(sched.kick(&target, false).accepted);
        sched.join(&target).await;

        let reused = sched.kick(&target, false);
        assert!(!reused.accepted);
        assert!(reused.reused_cache);
        assert_eq!(reused.message(), "Using cached result");
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

        assert!(sched.kick(&target, true).accepted);
        sched.join(&target).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried() {
        let runner = Arc::new(FakeRunner {
            fail_first: 1,
            error: AcquisitionError::NoMatchesFound { best_partial: 4 },
            ..FakeRunner::ok()
        });
        let sched = scheduler(runner.clone(), 2);
        let target = Target::Draw("a_1".to_string());

        sched.kick(&target, false);
        sched.join(&target).await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 2);
        assert!(sched.status(&target).ok);
    }

    #[tokio::test]
    async fn test_discovery_empty_is_not_retried_and_is_data() {
        let runner = Arc::new(FakeRunner {
            fail_first: 5,
            error: AcquisitionError::DiscoveryEmpty,
            ..FakeRunner::ok()
        });
        let sched = scheduler(runner.clone(), 3);

        sched.kick(&Target::Auto, false);
        sched.join(&Target::Auto).await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
        let snap = sched.status(&Target::Auto);
        assert!(!snap.ok);
        assert!(!snap.in_progress);
        assert_eq!(snap.error_code, Some("E_DISCOVERY_EMPTY"));
        assert!(snap.matches.is_none());
    }

    #[tokio::test]
    async fn test_auto_success_is_mirrored_to_concrete_key() {
        let runner = Arc::new(FakeRunner::ok());
        let sched = scheduler(runner.clone(), 1);

        sched.kick(&Target::Auto, false);
        sched.join(&Target::Auto).await;

        let auto = sched.status(&Target::Auto);
        assert_eq!(auto.kohde.as_deref(), Some("a_100522"));
        assert!(auto.ok);

        let concrete = Target::Draw("a_100522".to_string());
        assert!(sched.status(&concrete).ok);
        assert!(sched.kick(&concrete, false).reused_cache);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_releases_key() {
        let runner = Arc::new(FakeRunner {
            panic: true,
            ..FakeRunner::ok()
        });
        let sched = scheduler(runner, 1);
        let target = Target::Draw("a_1".to_string());

        sched.kick(&target, false);
        sched.join(&target).await;

        let snap = sched.status(&target);
        assert!(!snap.in_progress);
        assert_eq!(snap.last_error.as_deref(), Some("job aborted"));
    }

    #[tokio::test]
    async fn test_prune_idle_keeps_auto() {
        let runner = Arc::new(FakeRunner::ok());
        let sched = scheduler(runner, 1);

        sched.status(&Target::Draw("never-kicked".to_string()));
        sched.kick(&Target::Auto, false);
        sched.join(&Target::Auto).await;
        sched.kick(&Target::Draw("a_1".to_string()), false);
        sched.join(&Target::Draw("a_1".to_string())).await;
        assert_eq!(sched.tracked_keys(), 3);

        assert_eq!(sched.prune_idle(Duration::ZERO), 2);
        assert_eq!(sched.tracked_keys(), 1);
        assert_eq!(sched.running_jobs(), 0);
    }

    #[tokio::test]
    async fn test_status_of_unknown_key_does_not_create_it() {
        let sched = scheduler(Arc::new(FakeRunner::ok()), 1);
        let snap = sched.status(&Target::Draw("a_404".to_string()));
        assert!(!snap.ok);
        assert_eq!(sched.tracked_keys(), 0);
    }
}
