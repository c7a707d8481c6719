use rusty_cqrs_store::{
    adapters::{postgres::PostgresEventStore, table::TableEventStore},
    api::{handlers::AppState, router::create_router},
    config::AppConfig,
    ports::EventStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_cqrs_store=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Select the event store backend
    let event_store: Arc<dyn EventStore> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;

            let store = PostgresEventStore::new(pool);
            store.migrate().await?;

            tracing::info!("Using PostgreSQL event store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory table event store");
            Arc::new(TableEventStore::in_memory())
        }
    };

    // Create application state
    let app_state = Arc::new(AppState { event_store });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;
    Ok(())
}
