//! Item Group Proxy Binary
//!
//! Reads upstream and client events as NDJSON, maintains the item group
//! index, and writes one forwarded status per affected client stream to
//! stdout.
//!
//! # Usage
//!
//! ```bash
//! item-group-proxy < events.ndjson > statuses.ndjson
//! ```
//!
//! # Environment Variables
//!
//! - `ITEM_GROUP_INPUT`: NDJSON event file, `-` for stdin (default: stdin)
//! - `ITEM_GROUP_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `ITEM_GROUP_OUTBOUND_CAPACITY`: Forwarded status queue size (default: 4096)
//! - `ITEM_GROUP_PURGE_EMPTY_GROUPS`: Drop groups emptied by merges (default: false)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: cream-item-group-proxy)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use item_group_proxy::infrastructure::input::{open_input, run_event_loop};
use item_group_proxy::infrastructure::telemetry;
use item_group_proxy::{
    ChannelSink, HealthServer, HealthServerState, ItemGroupRouter, RouterConfig, RouterOptions,
    init_metrics, run_writer,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Item Group Proxy");

    let _metrics_handle = init_metrics();

    let config = RouterConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let (sink, rx) = ChannelSink::channel(config.outbound.capacity);
    let mut router = ItemGroupRouter::new(
        sink,
        RouterOptions {
            purge_empty_groups: config.purge_empty_groups,
        },
    );

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        router.stats_handle(),
    ));

    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_server = HealthServer::new(
            config.server.health_port,
            Arc::clone(&health_state),
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let writer = tokio::spawn(run_writer(rx, tokio::io::stdout()));

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let reader = open_input(&config.input).await?;
    health_state.set_input_open(true);
    tracing::info!(input = %config.input.describe(), "Item group proxy ready");

    let result = run_event_loop(reader, &mut router, &shutdown_token).await;
    health_state.set_input_open(false);

    if let Ok(summary) = &result {
        tracing::info!(
            lines = summary.lines,
            events = summary.events,
            decode_errors = summary.decode_errors,
            interrupted = summary.interrupted,
            "Event loop finished"
        );
    }

    let stats = router.stats();
    tracing::info!(
        events = stats.events_processed,
        forwarded = stats.statuses_forwarded,
        failed = stats.forward_failures,
        pending = stats.pending_requests,
        services = stats.index.service_count,
        groups = stats.index.group_count,
        subscriptions = stats.index.subscription_count,
        "Router stats"
    );

    // Dropping the router closes the outbound channel so the writer drains and exits.
    drop(router);
    let written = writer.await.context("status writer panicked")??;
    tracing::info!(written, "Forwarded statuses flushed");

    shutdown_token.cancel();
    result?;

    tracing::info!("Item group proxy stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &RouterConfig) {
    tracing::info!(
        input = %config.input.describe(),
        health_port = config.server.health_port,
        outbound_capacity = config.outbound.capacity,
        purge_empty_groups = config.purge_empty_groups,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
