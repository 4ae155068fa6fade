//! `LearnHub` Server - Main Entry Point
//!
//! Connects to the database, applies migrations and reports the user census.

use anyhow::Result;
use tracing::info;

use learnhub_server::users::{Argon2Hasher, PgUserRepository, UserService};
use learnhub_server::{config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnhub_server=debug,sqlx=warn".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting LearnHub Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let hasher = Argon2Hasher::from_config(&config)?;
    let users = UserService::new(PgUserRepository::new(db_pool.clone()), hasher);

    for (user_type, count) in users.census().await? {
        info!(%user_type, count, "User census");
    }

    db_pool.close().await;
    info!("Server shutdown complete");

    Ok(())
}
