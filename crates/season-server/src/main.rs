use anyhow::Context;
use clap::Parser;
use season_server::{config::Config, metrics::Metrics, server::BroadcastServer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = Config::parse();
    config.validate()?;
    tracing::info!(config = ?config, "Loaded configuration");

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let metrics = Arc::new(Metrics::new().context("Failed to create the metrics registry")?);

    let mut server = BroadcastServer::bind(config.listen_addr, config.settings(), metrics.clone())
        .await
        .context("Failed to start the season server")?;

    let server_handle = {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { server.run(rx).await })
    };

    let metrics_handle = config.metrics_listen_addr.map(|addr| {
        let router = metrics.router();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind metrics listener on {addr}"))?;
            tracing::info!(%addr, "Serving metrics.");
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = rx.changed().await;
                })
                .await?;
            Ok::<(), anyhow::Error>(())
        })
    });

    tracing::info!("Season server started. Awaiting shutdown signal...");
    shutdown_signal().await;

    tracing::info!("Shutdown signal received. Terminating services...");
    // Dropping the sender wakes every receiver.
    drop(shutdown_tx);

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Season server failed."),
        Err(e) => tracing::error!(error = %e, "Season server task panicked."),
    }
    if let Some(handle) = metrics_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Metrics server failed."),
            Err(e) => tracing::error!(error = %e, "Metrics server task panicked."),
        }
    }

    tracing::info!("Season server shut down gracefully.");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install the SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
