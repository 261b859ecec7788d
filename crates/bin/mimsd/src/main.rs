//! # mimsd: MIMS daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`mims.toml`, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repositories, delivery clients and application services
//! - Create the bootstrap administrator on an empty database
//! - Spawn the event consumer, the outbox worker and session housekeeping
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use mims_adapter_http_axum::state::{Auth, Notifications};
use mims_adapter_storage_sqlite_sqlx::Config as StorageConfig;
use mims_app::rate_limiter::RateLimiter;
use mimsd::config::Config;
use mimsd::wiring::{SqliteBackend, assemble};

/// How often expired sessions and stale throttling buckets are dropped.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on handling the events still queued at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("opening database")?;

    let mims = assemble(&config, &db).await?;
    let state = mims.state;

    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password)
    {
        state
            .auth
            .bootstrap_admin(email, password)
            .await
            .context("creating bootstrap administrator")?;
    }

    // Background tasks
    let (stop_events, events_stopped) = tokio::sync::oneshot::channel::<()>();
    let events = tokio::spawn(mims.events.run(state.event_bus.subscribe(), async move {
        let _ = events_stopped.await;
    }));
    let mut tasks = vec![
        tokio::spawn(housekeeping(
            Arc::clone(&state.auth),
            Arc::clone(&state.rate_limiter),
        )),
    ];
    if config.outbox.interval_secs > 0 {
        tasks.push(tokio::spawn(outbox_worker(
            Arc::clone(&state.notifications),
            Duration::from_secs(config.outbox.interval_secs),
            config.outbox.batch_size,
        )));
    } else {
        tracing::info!("outbox worker disabled, waiting for the cron endpoint");
    }

    // HTTP
    let bus = Arc::clone(&state.event_bus);
    let app = mims_adapter_http_axum::router::build(state);
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "mimsd listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        // ends open event streams so the server can drain
        bus.close();
    })
    .await
    .context("serving HTTP")?;

    for task in tasks {
        task.abort();
    }
    let _ = stop_events.send(());
    match tokio::time::timeout(DRAIN_TIMEOUT, events).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(%err, "event handler crashed"),
        Err(_) => tracing::warn!("event handler did not drain in time"),
    }
    tracing::info!("mimsd stopped");
    Ok(())
}

/// Push pending LINE notifications at a fixed pace.
async fn outbox_worker(
    notifications: Arc<Notifications<SqliteBackend>>,
    every: Duration,
    batch_size: u32,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match notifications.process_outbox(batch_size).await {
            Ok(report) if report.processed > 0 => tracing::info!(
                processed = report.processed,
                sent = report.sent,
                failed = report.failed,
                "outbox pass finished"
            ),
            Ok(_) => {}
            Err(err) => tracing::error!(%err, "outbox pass failed"),
        }
    }
}

async fn housekeeping(auth: Arc<Auth<SqliteBackend>>, rate_limiter: Arc<RateLimiter>) {
    let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = auth.purge_expired_sessions().await {
            tracing::error!(%err, "session purge failed");
        }
        rate_limiter.prune();
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown requested");
}
