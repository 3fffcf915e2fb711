//! Server configuration via CLI args and environment variables.

use std::path::PathBuf;

use clap::Parser;
use datagate_errors::Environment;

/// HTTP data endpoint behind a hardened middleware stack.
#[derive(Parser, Debug, Clone)]
#[command(name = "datagate-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "DATAGATE_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 3000, env = "DATAGATE_PORT")]
    pub port: u16,

    /// Deployment environment. `production` hides error details from
    /// clients; any other value keeps full diagnostics.
    #[arg(long = "env", default_value = "development", env = "DATAGATE_ENV")]
    pub environment: Environment,

    /// JSON document served by `/api/v1/data`. Omit to serve an empty list.
    #[arg(long, env = "DATAGATE_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Directory of static files served for paths outside the API.
    #[arg(long, default_value = "public", env = "DATAGATE_PUBLIC_DIR")]
    pub public_dir: PathBuf,

    /// CORS allowed origins (comma-separated). `*` allows any origin, empty
    /// disables CORS headers.
    #[arg(
        long,
        default_value = "*",
        env = "DATAGATE_CORS_ORIGINS",
        value_delimiter = ','
    )]
    pub cors_origins: Vec<String>,

    /// Maximum requests per client IP per window on `/api` (0 = disabled).
    #[arg(long, default_value_t = 1000, env = "DATAGATE_RATE_LIMIT")]
    pub rate_limit: u64,

    /// Rate limit window in seconds.
    #[arg(long, default_value_t = 3600, env = "DATAGATE_RATE_LIMIT_WINDOW")]
    pub rate_limit_window: u64,

    /// Maximum JSON request body size in bytes.
    #[arg(long, default_value_t = 10 * 1024, env = "DATAGATE_BODY_LIMIT")]
    pub body_limit: usize,

    /// Log level.
    #[arg(long, default_value = "info", env = "DATAGATE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (`text` or `json`).
    #[arg(long, default_value = "text", env = "DATAGATE_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
