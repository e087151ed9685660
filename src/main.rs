use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use foodgram::{
    actions::ingredients::{load_ingredients, parse_ingredient_file},
    config::{Cli, Command, DatabaseConfig, ServeConfig},
    jwt::SessionKeys,
    media::MediaStore,
    state::AppState,
    Cache,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,foodgram=debug")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve(config) => serve(&cli.database, config).await,
        Command::Migrate => connect(&cli.database).await.map(|_| ()),
        Command::LoadIngredients { path, redis_url } => {
            load(&cli.database, &path, redis_url.as_deref()).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Connects and runs pending migrations.
async fn connect(config: &DatabaseConfig) -> Result<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    log::info!("Database is up to date");

    Ok(pool)
}

async fn serve(database: &DatabaseConfig, config: ServeConfig) -> Result<()> {
    let pool = connect(database).await?;
    let cache = Cache::connect(config.redis_url.as_deref()).await;
    let keys = SessionKeys::new(&config.jwt_secret, config.session_lifetime_hours)
        .context("Invalid session configuration")?;
    let media = MediaStore::new(&config.media_root);

    let state = AppState::new(pool, cache, keys, media);

    log::info!("Listening on http://{}", config.addr);
    warp::serve(foodgram::api(state)).run(config.addr).await;
    Ok(())
}

async fn load(
    database: &DatabaseConfig,
    path: &std::path::Path,
    redis_url: Option<&str>,
) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entries = parse_ingredient_file(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let pool = connect(database).await?;
    let cache = Cache::connect(redis_url).await;
    let report = load_ingredients(&pool, &cache, entries)
        .await
        .context("Failed to load ingredients")?;

    log::info!(
        "Loaded {} ingredients, skipped {}",
        report.created,
        report.skipped
    );
    Ok(())
}
