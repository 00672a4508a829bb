use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use medistock_api::{
    api_v1_routes,
    cache::ViewCache,
    config::load_config,
    db::{establish_connection_with_config, DbConfig},
    events::{process_events, EventSender},
    migrator::Migrator,
    notifications::ContactNotifier,
    webhook_routes, AppServices, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!(
        environment = %config.environment,
        "Starting medistock-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        establish_connection_with_config(&DbConfig::from_app_config(&config)).await?,
    );

    if config.auto_migrate {
        info!("Running database migrations");
        Migrator::up(db.as_ref(), None).await?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    tokio::spawn(process_events(event_rx));
    let event_sender = EventSender::new(event_tx);

    let cache = ViewCache::new(Duration::from_secs(config.view_cache_ttl_secs));
    let notifier = Arc::new(ContactNotifier);

    let services = AppServices::build(
        db.clone(),
        &config,
        event_sender.clone(),
        cache.clone(),
        notifier,
    );

    let state = AppState {
        db,
        config: config.clone(),
        event_sender,
        cache,
        services,
    };

    let app = Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest("/webhooks", webhook_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}
