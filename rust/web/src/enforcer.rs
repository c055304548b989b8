//! Turn-timeout enforcer.
//!
//! Two periodic jobs run against the shared store, each under its own
//! advisory lock:
//!
//! - the **timeout sweep** resolves holding rounds whose deadline has passed,
//!   through the same transition a player's confirm uses;
//! - the **warning sweep** tells players their deadline is close, once per round.
//!
//! Any number of instances may run the enforcer. A sweep that finds the lock
//! taken yields with [`SweepOutcome::Contended`]; the lock auto-expires after
//! its TTL, so a crashed holder only delays the next sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gambit_engine::errors::RoundError;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::GambitConfig;
use crate::metrics::{EnforcerMetrics, SweepTimer};
use crate::services::{CombatService, ServiceError};
use crate::store::{SqliteStore, StoreError};

pub const TIMEOUT_JOB: &str = "round-timeout-sweep";
pub const WARNING_JOB: &str = "round-timeout-warning";

#[derive(Debug, Clone, PartialEq)]
pub struct EnforcerConfig {
    pub batch_size: usize,
    pub lock_ttl: Duration,
    pub warning_lead_secs: u32,
    pub sweep_interval: Duration,
    pub warning_interval: Duration,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self::from(&GambitConfig::default())
    }
}

impl From<&GambitConfig> for EnforcerConfig {
    fn from(cfg: &GambitConfig) -> Self {
        Self {
            batch_size: cfg.sweep_batch_size,
            lock_ttl: cfg.lock_ttl(),
            warning_lead_secs: cfg.warning_lead_secs,
            sweep_interval: cfg.sweep_interval(),
            warning_interval: cfg.warning_interval(),
        }
    }
}

/// Per-sweep tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Rounds picked up by this sweep
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Already handled by someone else between the query and the write
    pub skipped: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another instance holds the job lock
    Contended,
    /// Another instance ran the job within the last half interval
    Skipped,
}

#[derive(Debug, Error)]
pub enum EnforcerError {
    #[error("Sweep could not reach the store: {0}")]
    Store(#[from] StoreError),
    #[error("Sweep task failed: {0}")]
    Worker(String),
}

#[derive(Debug)]
pub struct TimeoutEnforcer {
    combat: Arc<CombatService>,
    config: EnforcerConfig,
    instance_id: String,
    metrics: EnforcerMetrics,
}

impl TimeoutEnforcer {
    pub fn new(combat: Arc<CombatService>, config: EnforcerConfig) -> Self {
        Self::with_instance_id(combat, config, uuid::Uuid::new_v4().to_string())
    }

    pub fn with_instance_id(
        combat: Arc<CombatService>,
        config: EnforcerConfig,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            combat,
            config,
            instance_id: instance_id.into(),
            metrics: EnforcerMetrics::new(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn metrics(&self) -> &EnforcerMetrics {
        &self.metrics
    }

    /// Resolves up to one batch of overdue rounds, earliest deadline first.
    pub fn run_timeout_sweep(&self, now: DateTime<Utc>) -> Result<SweepOutcome, EnforcerError> {
        let store = self.combat.store();
        let Some(_lock) = self.lock(store, TIMEOUT_JOB, now)? else {
            return Ok(SweepOutcome::Contended);
        };
        let timer = SweepTimer::new(self.metrics.clone());

        let batch = store.overdue_rounds(now, self.config.batch_size)?;
        let mut report = SweepReport {
            processed: batch.encounter_ids.len(),
            has_more: batch.has_more,
            ..SweepReport::default()
        };
        for encounter_id in &batch.encounter_ids {
            match self.resolve_one(encounter_id, now) {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        job = TIMEOUT_JOB,
                        encounter_id = %encounter_id,
                        error = %e,
                        "failed to resolve overdue round"
                    );
                }
            }
        }
        store.record_job_run(TIMEOUT_JOB, &self.instance_id, now)?;

        self.metrics.record_resolved(report.succeeded as u64);
        self.metrics.record_failures(report.failed as u64);
        timer.finish();
        log_report(TIMEOUT_JOB, &report);
        Ok(SweepOutcome::Completed(report))
    }

    /// Warns holding rounds whose deadline is within the configured lead.
    pub fn run_warning_sweep(&self, now: DateTime<Utc>) -> Result<SweepOutcome, EnforcerError> {
        let store = self.combat.store();
        let Some(_lock) = self.lock(store, WARNING_JOB, now)? else {
            return Ok(SweepOutcome::Contended);
        };
        let timer = SweepTimer::new(self.metrics.clone());

        let lead = self.config.warning_lead_secs;
        let batch = store.warning_candidates(
            now,
            Duration::from_secs(u64::from(lead)),
            self.config.batch_size,
        )?;
        let mut report = SweepReport {
            processed: batch.encounter_ids.len(),
            has_more: batch.has_more,
            ..SweepReport::default()
        };
        for encounter_id in &batch.encounter_ids {
            match self.combat.warn_if_due(encounter_id, now, lead) {
                Ok(Some(_)) => report.succeeded += 1,
                Ok(None) => report.skipped += 1,
                Err(ServiceError::Store(StoreError::VersionConflict { .. })) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        job = WARNING_JOB,
                        encounter_id = %encounter_id,
                        error = %e,
                        "failed to send timeout warning"
                    );
                }
            }
        }
        store.record_job_run(WARNING_JOB, &self.instance_id, now)?;

        self.metrics.record_warnings(report.succeeded as u64);
        self.metrics.record_failures(report.failed as u64);
        timer.finish();
        log_report(WARNING_JOB, &report);
        Ok(SweepOutcome::Completed(report))
    }

    /// Scheduled entry point for the timeout sweep.
    pub fn tick_timeout(&self, now: DateTime<Utc>) -> Result<SweepOutcome, EnforcerError> {
        if self.ran_recently(TIMEOUT_JOB, self.config.sweep_interval, now)? {
            self.metrics.record_skipped();
            return Ok(SweepOutcome::Skipped);
        }
        self.run_timeout_sweep(now)
    }

    /// Scheduled entry point for the warning sweep.
    pub fn tick_warning(&self, now: DateTime<Utc>) -> Result<SweepOutcome, EnforcerError> {
        if self.ran_recently(WARNING_JOB, self.config.warning_interval, now)? {
            self.metrics.record_skipped();
            return Ok(SweepOutcome::Skipped);
        }
        self.run_warning_sweep(now)
    }

    /// Runs both sweeps on their intervals until `shutdown` turns true or its sender drops.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(self.config.sweep_interval);
            let mut warn = tokio::time::interval(self.config.warning_interval);
            sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
            warn.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(instance_id = %self.instance_id, "timeout enforcer started");

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = sweep.tick() => {
                        let enforcer = Arc::clone(&self);
                        let result = off_runtime(move || enforcer.tick_timeout(Utc::now())).await;
                        log_failure(TIMEOUT_JOB, result);
                    }
                    _ = warn.tick() => {
                        let enforcer = Arc::clone(&self);
                        let result = off_runtime(move || enforcer.tick_warning(Utc::now())).await;
                        log_failure(WARNING_JOB, result);
                    }
                }
            }

            self.metrics.log_metrics();
            tracing::info!(instance_id = %self.instance_id, "timeout enforcer stopped");
        })
    }

    fn lock<'a>(
        &'a self,
        store: &'a SqliteStore,
        job: &'static str,
        now: DateTime<Utc>,
    ) -> Result<Option<JobLock<'a>>, StoreError> {
        let lock = JobLock::acquire(store, job, &self.instance_id, now, self.config.lock_ttl)?;
        if lock.is_none() {
            self.metrics.record_contended();
            tracing::debug!(job, instance_id = %self.instance_id, "job lock held elsewhere");
        }
        Ok(lock)
    }

    /// `Ok(false)` when the round no longer needs resolving.
    fn resolve_one(&self, encounter_id: &str, now: DateTime<Utc>) -> Result<bool, ServiceError> {
        // one retry: a conflicting write usually means the player just confirmed
        for attempt in 0..2 {
            match self.combat.resolve_overdue(encounter_id, now) {
                Ok(_) => return Ok(true),
                Err(ServiceError::Round(RoundError::AlreadyResolved))
                | Err(ServiceError::Store(StoreError::NotFound { .. })) => return Ok(false),
                Err(ServiceError::Store(StoreError::VersionConflict { .. })) if attempt == 0 => {
                    tracing::debug!(encounter_id = %encounter_id, "round changed under the sweep; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    fn ran_recently(
        &self,
        job: &str,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(last) = self.combat.store().last_job_run(job)? else {
            return Ok(false);
        };
        let half = chrono::Duration::from_std(interval / 2).unwrap_or(chrono::Duration::zero());
        Ok(now >= last && now - last < half)
    }
}

/// Holds a job lock; releasing it on drop covers early returns and panics.
struct JobLock<'a> {
    store: &'a SqliteStore,
    job: &'static str,
    holder: &'a str,
}

impl<'a> JobLock<'a> {
    fn acquire(
        store: &'a SqliteStore,
        job: &'static str,
        holder: &'a str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<Self>, StoreError> {
        if store.try_acquire_lock(job, holder, now, ttl)? {
            Ok(Some(Self { store, job, holder }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for JobLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release_lock(self.job, self.holder) {
            // the TTL frees it eventually
            tracing::warn!(job = self.job, error = %e, "failed to release job lock");
        }
    }
}

fn log_report(job: &str, report: &SweepReport) {
    if report.processed == 0 {
        tracing::trace!(job, "sweep found nothing to do");
        return;
    }
    tracing::info!(
        job,
        batch_size = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        has_more = report.has_more,
        "sweep finished"
    );
}

/// Sweeps hold the store mutex and can wait out SQLite's busy timeout, so the
/// loop hands them to the blocking pool.
async fn off_runtime<F>(sweep: F) -> Result<SweepOutcome, EnforcerError>
where
    F: FnOnce() -> Result<SweepOutcome, EnforcerError> + Send + 'static,
{
    match tokio::task::spawn_blocking(sweep).await {
        Ok(result) => result,
        Err(err) => Err(EnforcerError::Worker(err.to_string())),
    }
}

fn log_failure(job: &str, result: Result<SweepOutcome, EnforcerError>) {
    if let Err(e) = result {
        tracing::error!(job, error = %e, "sweep failed");
    }
}
