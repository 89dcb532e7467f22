//! Periodic sync loop.
//!
//! Each tick resolves the tracked targets, then for each one asks the
//! coordinator whether it is stale. Stale targets are fetched, validated,
//! persisted and only then marked fresh. Targets are processed one at a time
//! so the rate limiter sees a single outbound stream.

use crate::cancel::CancellationToken;
use crate::config::SchedulerConfig;
use crate::error::{Result, SyncError};
use crate::freshness::{compute_payload_hash, CacheCoordinator};
use crate::models::{CompetitionsResponse, EntityType, SyncTarget};
use crate::network::DynUpstreamSource;
use crate::repository::{DynRepository, EntityRecord};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Counts from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub checked: usize,
    pub refreshed: usize,
    pub skipped_fresh: usize,
    pub failed: usize,
    /// The tick stopped early because of cancellation.
    pub cancelled: bool,
}

/// Keeps tracked entities fresh against the upstream.
pub struct SyncScheduler {
    config: SchedulerConfig,
    source: DynUpstreamSource,
    coordinator: Arc<CacheCoordinator>,
    repository: DynRepository,
    running: AtomicBool,
}

impl SyncScheduler {
    pub fn new(
        config: SchedulerConfig,
        source: DynUpstreamSource,
        coordinator: Arc<CacheCoordinator>,
        repository: DynRepository,
    ) -> Self {
        Self {
            config,
            source,
            coordinator,
            repository,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the loop on the current runtime.
    ///
    /// The loop ends when the handle's `stop()` is called or `cancel` fires.
    /// The scheduler is marked running before this returns, so a second
    /// call fails until the spawned loop has exited.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> Result<SchedulerHandle> {
        self.claim()?;

        let stop = CancellationToken::new();
        let task = {
            let stop = stop.clone();
            tokio::spawn(async move { self.run_owned(cancel, stop).await })
        };

        Ok(SchedulerHandle { stop, task })
    }

    /// Run ticks until `stop` or `cancel` fires.
    ///
    /// The first tick runs immediately. An in-flight tick is abandoned, not
    /// drained, when either signal arrives.
    pub async fn run(&self, cancel: CancellationToken, stop: CancellationToken) -> Result<()> {
        self.claim()?;
        self.run_owned(cancel, stop).await;
        Ok(())
    }

    fn claim(&self) -> Result<()> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| SyncError::Config {
                message: "Scheduler is already running".into(),
            })
    }

    /// Loop body. The caller has already claimed `running`.
    async fn run_owned(&self, cancel: CancellationToken, stop: CancellationToken) {
        info!(
            "Sync scheduler started (interval {:?})",
            self.config.sync_interval
        );

        let period = self.config.sync_interval.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = stop.cancelled() => break,
                report = self.run_tick(&cancel) => {
                    info!(
                        "Sync tick complete: checked={} refreshed={} fresh={} failed={}",
                        report.checked, report.refreshed, report.skipped_fresh, report.failed
                    );
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Sync scheduler stopped");
    }

    /// Run one tick over every tracked target.
    ///
    /// A failing target is logged and counted; the tick moves on to the next
    /// one. Only cancellation ends a tick early.
    pub async fn run_tick(&self, cancel: &CancellationToken) -> TickReport {
        let mut report = TickReport::default();
        let (targets, mut touched_upstream) = self.resolve_targets(cancel).await;

        for target in targets {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.checked += 1;

            if !self
                .coordinator
                .needs_refresh(target.entity_type, &target.key)
            {
                debug!("{} is fresh, skipping", target);
                report.skipped_fresh += 1;
                continue;
            }

            if touched_upstream && !self.pace(cancel).await {
                report.cancelled = true;
                break;
            }
            touched_upstream = true;

            match self.refresh_target(&target, cancel).await {
                Ok(()) => report.refreshed += 1,
                Err(SyncError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    if e.is_permanent() {
                        error!("Failed to sync {}: {}", target, e);
                    } else {
                        warn!("Failed to sync {} (will retry next tick): {}", target, e);
                    }
                }
            }
        }

        report
    }

    /// Targets for this tick and whether resolving them used the upstream.
    ///
    /// Tracked competition codes come from configuration; with none
    /// configured they are discovered through `/competitions`. Configured
    /// team ids follow the competition targets.
    async fn resolve_targets(&self, cancel: &CancellationToken) -> (Vec<SyncTarget>, bool) {
        let mut touched_upstream = false;

        let codes = if self.config.competition_codes.is_empty() {
            touched_upstream = true;
            match self.discover_competitions(cancel).await {
                Ok(codes) => {
                    debug!("Discovered {} competitions", codes.len());
                    codes
                }
                Err(e) => {
                    warn!("Competition discovery failed: {}", e);
                    Vec::new()
                }
            }
        } else {
            self.config.competition_codes.clone()
        };

        let mut targets: Vec<SyncTarget> = codes
            .iter()
            .flat_map(|code| SyncTarget::for_competition(code))
            .collect();
        targets.extend(
            self.config
                .team_ids
                .iter()
                .map(|id| SyncTarget::new(EntityType::Team, id.to_string())),
        );

        (targets, touched_upstream)
    }

    async fn discover_competitions(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let payload = self.source.fetch(cancel, "/competitions").await?;
        let response: CompetitionsResponse = serde_json::from_slice(&payload)
            .map_err(|e| SyncError::decode("competitions", e))?;

        Ok(response
            .competitions
            .into_iter()
            .filter_map(|c| c.code)
            .collect())
    }

    /// Fixed delay between upstream-touching targets. Returns false if
    /// cancelled while waiting.
    async fn pace(&self, cancel: &CancellationToken) -> bool {
        let delay = self.config.inter_entity_delay;
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Fetch, validate, persist, then record freshness for one target.
    ///
    /// Metadata is written only after the repository accepted the payload,
    /// so any earlier failure leaves the target stale for the next tick.
    async fn refresh_target(&self, target: &SyncTarget, cancel: &CancellationToken) -> Result<()> {
        let payload = self.source.fetch(cancel, &target.resource_path()).await?;

        target.entity_type.validate_payload(&payload)?;
        let data_hash = compute_payload_hash(&payload)
            .map_err(|e| SyncError::decode(target.entity_type.as_str(), e))?;
        let changed = !self
            .coordinator
            .is_unchanged(target.entity_type, &target.key, &data_hash);

        let record = EntityRecord {
            entity_type: target.entity_type,
            key: target.key.clone(),
            payload,
            fetched_at: self.coordinator.now(),
            data_hash: Some(data_hash.clone()),
        };
        self.repository
            .save(&record)
            .await
            .map_err(|e| match e {
                SyncError::Persistence { .. } => e,
                other => SyncError::persistence(target.to_string(), other),
            })?;

        self.coordinator
            .set_metadata(target.entity_type, &target.key, Some(data_hash))?;
        self.coordinator
            .set_entity(target.entity_type, &target.key, &record.payload)
            .await;

        if changed {
            info!("Synced {} (changed)", target);
        } else {
            debug!("Synced {} (unchanged)", target);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Handle to a scheduler started with [`SyncScheduler::start`].
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to stop. Returns immediately.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Sync scheduler task failed: {}", e);
        }
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}
