use std::sync::Arc;

use kala_api::config::Settings;
use kala_api::routes;
use kala_api::state::AppState;
use kala_store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env().unwrap_or_else(|e| {
        eprintln!("kala-api: {e}");
        std::process::exit(1);
    });

    let addr = settings.addr.clone();
    tracing::info!(
        version = %settings.kala.version,
        read_filter = settings.kala.read.whitelist.is_some(),
        write_mode = settings.kala.write.mode.as_str(),
        staging = %settings.kala.staging,
        "configuration loaded"
    );

    let state = AppState::new(Arc::new(MemoryStore::new()), settings.kala);
    let app = routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("kala-api: failed to bind {addr}: {e}");
            std::process::exit(1);
        });

    tracing::info!("kala-api listening on {addr}");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("kala-api: server error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
