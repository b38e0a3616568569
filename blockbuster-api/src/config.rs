/// Configuration management for the API server
///
/// Configuration comes from environment variables, with a `.env` file loaded
/// first when present.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: `SERVER_PORT`, then 8080)
/// - `API_CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `API_REQUEST_TIMEOUT_SECONDS`: Per-request deadline (default: 30)
/// - `DATABASE_URL`: PostgreSQL connection string. When unset, the URL is
///   assembled from `BLK_DATABASE_HOST`, `BLK_DATABASE_PORT`,
///   `BLK_DATABASE_USER`, `BLK_DATABASE_PASSWORD`, `BLK_DATABASE_NAME` and
///   `BLK_DATABASE_SSL_MODE`
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DATABASE_ACQUIRE_TIMEOUT_SECONDS`: Wait for a pooled connection (default: 30)
/// - `RUN_MIGRATIONS`: Apply embedded migrations at startup (default: true)
/// - `LOG_FORMAT`: `json` for structured logs, anything else for text
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use blockbuster_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use blockbuster_shared::db::pool::DatabaseConfig;
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database pool configuration
    pub database: DatabaseConfig,

    /// Apply embedded migrations before serving
    pub run_migrations: bool,

    /// Log output format
    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Requests running longer than this are answered with 408
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                request_timeout_seconds: 30,
            },
            database: DatabaseConfig::default(),
            run_migrations: true,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("API_PORT").or_else(|| var("SERVER_PORT")) {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("invalid API port: {}", port))?,
            None => 8080,
        };

        let cors_origins = var("API_CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);

        let url = match var("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&var)?,
        };

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url,
            max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            acquire_timeout_seconds: parse_or(
                &var,
                "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
                defaults.acquire_timeout_seconds,
            )?,
            ..defaults
        };

        let log_format = match var("LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                request_timeout_seconds: parse_or(&var, "API_REQUEST_TIMEOUT_SECONDS", 30)?,
            },
            database,
            run_migrations: parse_or(&var, "RUN_MIGRATIONS", true)?,
            log_format,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {}", key, value)),
        None => Ok(default),
    }
}

fn database_url_from_parts<F>(var: &F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = var("BLK_DATABASE_HOST").unwrap_or_else(|| "localhost".to_string());
    let port: u16 = parse_or(var, "BLK_DATABASE_PORT", 5580)?;
    let user = var("BLK_DATABASE_USER").unwrap_or_else(|| "postgres".to_string());
    let name = var("BLK_DATABASE_NAME").unwrap_or_else(|| "blockbuster".to_string());
    let ssl_mode = var("BLK_DATABASE_SSL_MODE").unwrap_or_else(|| "disable".to_string());

    let credentials = match var("BLK_DATABASE_PASSWORD") {
        Some(password) => format!("{}:{}", user, password),
        None => user,
    };

    Ok(format!(
        "postgres://{}@{}:{}/{}?sslmode={}",
        credentials, host, port, name, ssl_mode
    ))
}
