use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::constants::DEFAULT_SESSION_LIFETIME_HOURS;

#[derive(Parser, Debug)]
#[command(name = "foodgram")]
#[command(about = "Recipe sharing backend")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run pending migrations and start the http server
    Serve(ServeConfig),
    /// Run pending migrations and exit
    Migrate,
    /// Load ingredients from a json array of `{name, measurement_unit}`
    LoadIngredients {
        path: PathBuf,

        /// Rotates the ingredient cache of a running server when set
        #[arg(long, env = "REDIS_URL")]
        redis_url: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DatabaseConfig {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, default_value_t = 5, env = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,
}

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    #[arg(long, default_value = "127.0.0.1:8000", env = "FOODGRAM_ADDR")]
    pub addr: SocketAddr,

    /// Caching is disabled when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, default_value_t = DEFAULT_SESSION_LIFETIME_HOURS, env = "SESSION_LIFETIME_HOURS")]
    pub session_lifetime_hours: i64,

    #[arg(long, default_value = "media", env = "MEDIA_ROOT")]
    pub media_root: PathBuf,
}
