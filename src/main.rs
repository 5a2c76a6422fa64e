use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use events_api::config::{Config, StoreKind};
use events_api::handlers::AppState;
use events_api::routes::create_routes;
use events_api::store::{EventBackend, EventGateway, MemoryBackend, PostgresBackend};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("events_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");
    tracing::info!(
        "Starting {} v{}",
        config.api_title,
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        backend = %config.store.kind,
        table = %config.store.table_name,
        endpoint = %config.store.redacted_url(),
        "Event store settings"
    );
    tracing::info!("CORS origins: {:?}", config.cors_allowed_origins);

    let backend: Arc<dyn EventBackend> = match config.store.kind {
        StoreKind::Postgres => Arc::new(
            PostgresBackend::connect(&config.store)
                .await
                .expect("Failed to connect to event store"),
        ),
        StoreKind::Memory => Arc::new(MemoryBackend::new(config.store.scan_page_size)),
    };
    let gateway = EventGateway::new(backend);
    tracing::info!(backend = gateway.backend_name(), "Event store ready");

    let state = Arc::new(AppState {
        gateway: gateway.clone(),
        limits: config.limits,
        api_title: config.api_title.clone(),
    });
    let app: Router = create_routes(state, &config.cors_allowed_origins);

    let addr = config.socket_addr().expect("Invalid bind address");
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    gateway.close().await;
    tracing::info!("Shutting down {}", config.api_title);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
