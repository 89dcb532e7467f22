//! Engine wiring and lifecycle for the daemon.

use crate::Args;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use touchline::{
    build_volatile_cache_or_fallback, CacheBackendConfig, CacheCoordinator, CacheDefaults,
    CancellationToken, ClientOptions, RateLimit, SchedulerConfig, SqliteFreshnessStore,
    SqliteRepository, SyncScheduler, TickReport, TtlPolicy, UpstreamClient, UpstreamConfig,
};
use tracing::{info, warn};

pub async fn run(args: Args, database: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();

    let backend = CacheBackendConfig::from_settings(
        &args.cache_backend,
        args.cache_url.as_deref(),
        args.cache_capacity,
    );
    let (cache, lru) = build_volatile_cache_or_fallback(&backend).await;
    let sweeper = lru.map(|store| store.spawn_sweeper(CacheDefaults::SWEEP_INTERVAL, cancel.clone()));

    let repository = Arc::new(
        SqliteRepository::new(&database).context("Failed to open entity repository")?,
    );
    let freshness = Arc::new(
        SqliteFreshnessStore::new(&database).context("Failed to open freshness store")?,
    );

    let policy = args
        .ttl_overrides
        .iter()
        .fold(TtlPolicy::default(), |policy, (entity_type, ttl)| {
            policy.with_ttl(*entity_type, *ttl)
        });

    let coordinator = Arc::new(
        CacheCoordinator::new(freshness, policy)
            .with_volatile(cache)
            .with_repository(repository.clone()),
    );

    let options = ClientOptions::new(args.api_key)
        .base_url(args.base_url)
        .rate_limit(RateLimit::new(
            args.requests_per_minute,
            UpstreamConfig::RATE_WINDOW,
        ));
    let client = Arc::new(UpstreamClient::new(options).context("Failed to create upstream client")?);

    let config = SchedulerConfig {
        sync_interval: Duration::from_secs(args.sync_interval_secs),
        inter_entity_delay: Duration::from_millis(args.inter_entity_delay_ms),
        competition_codes: args.competitions,
        team_ids: args.teams,
    };
    let scheduler = Arc::new(SyncScheduler::new(
        config,
        client.clone(),
        coordinator,
        repository,
    ));

    if args.once {
        let report = run_once(&scheduler, &cancel, shutdown_signal()).await;
        info!(
            "Tick finished: checked={} refreshed={} fresh={} failed={} cancelled={}",
            report.checked, report.refreshed, report.skipped_fresh, report.failed, report.cancelled
        );
    } else {
        let handle = scheduler
            .clone()
            .start(cancel.clone())
            .context("Failed to start scheduler")?;

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received, stopping scheduler");
        handle.shutdown().await;
    }

    cancel.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!("Cache sweeper ended abnormally: {}", e);
        }
    }

    let quota = client.quota_state();
    if let Some(remaining) = quota.remaining {
        info!("Upstream quota remaining this minute: {}", remaining);
    }

    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run a single tick, cancelling it if `shutdown` resolves first.
///
/// The tick still returns its partial report after cancellation, so targets
/// already synced are kept and the rest stay stale.
async fn run_once<F>(
    scheduler: &SyncScheduler,
    cancel: &CancellationToken,
    shutdown: F,
) -> TickReport
where
    F: Future<Output = ()>,
{
    let tick = scheduler.run_tick(cancel);
    tokio::pin!(tick);
    tokio::pin!(shutdown);

    tokio::select! {
        biased;
        _ = &mut shutdown => {
            info!("Shutdown signal received, cancelling tick");
            cancel.cancel();
            tick.await
        }
        report = &mut tick => report,
    }
}
