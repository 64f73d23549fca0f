use dream_relay::{
    Bus, Config,
    sse::{AppState, router},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> dream_relay::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dream_relay=info")),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr;
    let state = AppState::new(Bus::new(config.clone()), config);
    let shutdown = state.shutdown.clone();

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Relay listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and ends every open event stream, which
/// lets the graceful shutdown finish.
async fn shutdown_signal(streams: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Couldn't listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Couldn't listen for SIGTERM");
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
    tracing::info!("Shutting down, closing event streams");
    streams.cancel();
}
