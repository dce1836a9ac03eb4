use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;

/// Resolve once the process is asked to stop.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    hireboard::telemetry::init_tracing();

    let state = match hireboard::initialize_state().await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "cannot initialize server state");
            std::process::exit(1);
        },
    };

    // Forget revoked tokens once they would have expired anyway.
    let interval = Duration::from_secs(state.config.revocation.prune_interval_secs.max(1));
    let tokens = state.token.clone();
    let pruner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match tokens.prune().await {
                Ok(0) => {},
                Ok(pruned) => tracing::info!(pruned, "revocation ledger pruned"),
                Err(err) => tracing::warn!(error = %err, "revocation ledger pruning failed"),
            }
        }
    });

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, state.config.port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "cannot bind listener");
            std::process::exit(1);
        },
    };
    tracing::info!(%addr, "server started");

    let db = state.db.clone();
    if let Err(err) = axum::serve(listener, hireboard::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server stopped unexpectedly");
    }

    pruner.abort();
    db.close().await;
    tracing::info!("server stopped");
}
