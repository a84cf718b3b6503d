use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::info;

use freshpure_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // One pooled client shared by every provider
    let http_client = reqwest::Client::builder()
        .timeout(cfg.notifications.timeout())
        .build()
        .context("failed to build HTTP client")?;

    let dispatcher = api::notifications::NotificationDispatcher::from_config(&cfg, http_client)?;
    info!(
        channels = ?dispatcher.channels(),
        timeout_secs = cfg.notifications.timeout_secs,
        "Notification channels configured"
    );

    let orders = Arc::new(api::services::orders::OrderService::new(
        Arc::new(dispatcher),
        cfg.currency_symbol.clone(),
    ));

    let host: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address '{}'", cfg.host))?;
    let addr = SocketAddr::new(host, cfg.port);

    let app = api::app(api::AppState::new(cfg, orders))?;

    info!("freshpure-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
