//! ==============================================================================
//! main.rs - relay entry point
//! ==============================================================================
//!
//! purpose:
//!     the process that sits between one air conditioner controller and any
//!     number of browser dashboards. it owns the only copy of device state.
//!
//! responsibilities:
//!     - load configuration (relay.toml + environment)
//!     - initialize logging
//!     - create the relay hub (state store + event channel)
//!     - start the poll scheduler
//!     - serve the http api / websocket channel until ctrl-c
//!
//! architecture:
//!
//!     ┌───────────────────────────────────────────────────────────────┐
//!     │                      relay (this process)                      │
//!     │  ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐  │
//!     │  │ poll         │   │ web server       │   │ websocket     │  │
//!     │  │ scheduler    │   │ /api/command     │   │ sessions      │  │
//!     │  │ (30s cycle)  │   │ /api/state       │   │ /ws           │  │
//!     │  └──────┬───────┘   └────────┬─────────┘   └───────┬───────┘  │
//!     │         └────────────────────┼─────────────────────┘          │
//!     │                        ┌─────┴─────┐                          │
//!     │                        │ RelayHub  │ <- hub.rs                │
//!     │                        └─────┬─────┘                          │
//!     │        (clone-able handle to the mutex-guarded state store)   │
//!     └──────────────────────────────┼────────────────────────────────┘
//!                      ┌─────────────┴─────────────┐
//!                      ▼                           ▼
//!              ┌──────────────┐            ┌──────────────┐
//!              │ controller   │            │ dashboards   │
//!              │ (esp32)      │            │ (browsers)   │
//!              └──────────────┘            └──────────────┘
//!
//! ==============================================================================

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use climate_relay::{config::RelayConfig, hub::RelayHub, scheduler, server};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration. logging is not up yet, so config loading
    // messages go through a temporary default subscriber.
    let config = tracing::subscriber::with_default(
        tracing_subscriber::fmt().finish(),
        RelayConfig::from_env,
    )?;

    // step 2: logging. RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    config.log_summary();

    // step 3: the single source of truth
    let hub = RelayHub::from_config(&config);

    // step 4: poll scheduler in background
    let poller = scheduler::spawn(hub.clone(), config.polling.interval());

    // step 5: serve until ctrl-c
    let addr = config.server.socket_addr()?;
    let app = server::router(hub, &config.server);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    poller.abort();
    tracing::info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
