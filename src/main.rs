use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use translation_gateway::api::{self, AppState};
use translation_gateway::config::Config;
use translation_gateway::services::{RemoteEngine, SchemaLayout};

fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Bounded worker pool serving requests
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let engine = RemoteEngine::new(&config.engine.url, config.engine_timeout()).map_err(|e| {
        error!("Failed to create engine client: {}", e);
        e
    })?;

    let state = AppState::new(
        Arc::new(engine),
        SchemaLayout::from_config(&config.schema),
        config.cache.failure_policy,
    );
    let lifecycle = state.lifecycle();

    let app = api::create_router_with_state(state);

    let addr: SocketAddr = config.server_address().parse()?;
    info!(
        "Listening on http://{}/translate?db=...&sql=... ({} workers, engine at {}, failure policy {:?})",
        addr, config.server.workers, config.engine.url, config.cache.failure_policy
    );
    info!("Warmup endpoint: http://{}/warmup?db=db1,db2,...", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close cached sessions so schemas are flushed
    let report = lifecycle.shutdown().await;
    for (name, reason) in &report.failed {
        error!("Session for {} was not closed cleanly: {}", name, reason);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received");
}
