mod alert;
mod api;
mod config;
mod controller;
mod error;
mod gateway;
mod pipeline;
mod refresh;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::alert::{LogNotifier, Notifier, PriceAlertWatcher, TerminalBell};
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::controller::Controller;
use crate::error::Result;
use crate::gateway::P2pClient;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let client = P2pClient::new(cfg.p2p_api_url.clone(), cfg.fetch_timeout)?;
    let gateway = Arc::new(client);
    info!(
        "Marketplace endpoint {} (timeout {:?})",
        cfg.p2p_api_url, cfg.fetch_timeout
    );

    let notifier: Box<dyn Notifier> = if cfg.alert_sound {
        Box::new(TerminalBell)
    } else {
        Box::new(LogNotifier)
    };
    match cfg.alert_threshold {
        Some(t) => info!("Price alert armed at {t:.2} {}", cfg.criteria.fiat),
        None => info!("Price alert disabled (set ALERT_THRESHOLD to arm it)"),
    }

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new()?);
    let (control_tx, control_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let (controller, view_rx) = Controller::new(
        &cfg,
        gateway,
        PriceAlertWatcher::new(notifier),
        control_rx,
        Arc::clone(&health),
        Arc::clone(&latency),
    );
    tokio::spawn(async move { controller.run().await });

    // HTTP API: the presentation boundary
    let state = ApiState {
        view_rx,
        control_tx,
        health,
        latency,
    };
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
