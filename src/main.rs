#![allow(clippy::result_large_err)]

use kisan_sathi::{
    api::{AppState, build_router},
    config::{
        Settings,
        database::{create_connection, create_tables},
        seed::{load_seed_config, seed_reference_data},
    },
    errors::Result,
    providers::Providers,
};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Runtime settings
    let settings = Settings::from_env()
        .inspect_err(|e| error!("Critical error loading settings: {}", e))?;
    info!("Settings loaded, binding to {}", settings.bind_addr);

    // 4. Database
    let db = create_connection(&settings.database_url)
        .await
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db)
        .await
        .inspect(|()| info!("Database tables ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Reference data
    if settings.seed_config.exists() {
        let seed = load_seed_config(&settings.seed_config)
            .inspect_err(|e| error!("Failed to read {}: {}", settings.seed_config.display(), e))?;
        seed_reference_data(&db, &seed)
            .await
            .inspect(|inserted| info!("Seeded {} reference rows.", inserted))
            .inspect_err(|e| error!("Failed to seed reference data: {}", e))?;
    } else {
        warn!(
            "Seed file {} not found, skipping reference data.",
            settings.seed_config.display()
        );
    }

    // 6. Outbound services and media storage
    let providers = Providers::from_settings(&settings)
        .inspect_err(|e| error!("Failed to initialise providers: {}", e))?;
    tokio::fs::create_dir_all(&settings.media_dir)
        .await
        .inspect_err(|e| error!("Cannot create media directory: {}", e))?;

    // 7. Serve
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", settings.bind_addr, e))?;
    let app = build_router(AppState::new(db, settings, providers));
    info!("Kisan Sathi listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received.");
}
