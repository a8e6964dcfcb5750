use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use chrono::Utc;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use carpool_backend::{
    config::{Config, StoreBackend},
    db,
    entities::rider,
    middleware::rate_limit::{create_global_governor, log_request},
    routes,
    store::{ActiveBookingStore, MemoryStore, PgStore},
    utils::clock::SystemClock,
    AppState, CarpoolEngine,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carpool_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    let store: Arc<dyn ActiveBookingStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let db = db::connect(&config)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Connected to database");

            migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            tracing::info!("Migrations complete");

            Arc::new(PgStore::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if config.seed_dev_riders {
        seed_dev_riders(store.as_ref()).await;
    }

    let engine = CarpoolEngine::new(store, Arc::new(SystemClock), &config.matching)
        .expect("Invalid matching settings");

    // Expiry sweeper runs for the lifetime of the process
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = engine.sweeper().spawn(shutdown_rx);

    let state = AppState::new(engine, config.clone());

    // Create router with middleware
    let app = routes::create_router(state)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(create_global_governor());

    // Start server with socket address for rate limiting
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!("Expiry sweeper panicked: {}", e);
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Seed the demo riders if they don't exist
async fn seed_dev_riders(store: &dyn ActiveBookingStore) {
    let riders = [
        ("djohnoe", "John", "Doe", "johndoe@gmail.com", 1_000),
        ("janeDOE", "Jane", "Doe", "jane@gmail.com", 90_000),
    ];

    for (username, first_name, last_name, email, salary) in riders {
        let rider = rider::Model {
            id: Uuid::new_v4(),
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            salary,
            created_at: Utc::now(),
        };
        let id = rider.id;

        match store.ensure_rider(rider).await {
            Ok(true) => tracing::info!("Dev rider created: {} ({})", username, id),
            Ok(false) => tracing::debug!("Dev rider already present: {}", username),
            Err(e) => tracing::error!("Failed to seed dev rider {}: {}", username, e),
        }
    }
}
