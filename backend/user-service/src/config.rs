use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub log: LogConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub jwt: JwtConfig,
    pub api: ApiConfig,
    pub cors: CorsConfig,
    pub oauth2: OAuth2Config,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub server_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    Memory,
}

impl FromStr for Driver {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "memory" => Ok(Driver::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub driver: Driver,
    /// Required when the driver is Postgres.
    pub url: Option<String>,
    pub max_connections: u32,
    pub query_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: i64,

    #[serde(default = "default_session_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig").field("secret", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_version")]
    pub default_version: String,

    #[serde(default = "default_api_version")]
    pub min_version: String,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Default, Deserialize)]
pub struct OAuth2Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

impl OAuth2Config {
    /// All three settings present and non-empty.
    pub fn is_configured(&self) -> bool {
        [&self.client_id, &self.client_secret, &self.redirect_url]
            .iter()
            .all(|v| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
    }
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

// Default value functions
fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_max_connections() -> u32 {
    25
}

fn default_db_query_timeout_secs() -> u64 {
    5
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_session_sweep_interval_secs() -> u64 {
    300
}

fn default_api_version() -> String {
    "1.0".to_string()
}

fn default_server_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Read `name`, falling back to `default` when unset. A set but unparsable
/// value is an error.
fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let app = AppConfig {
            env: env::var("APP_ENV").unwrap_or_else(|_| default_app_env()),
            host: env::var("APP_HOST").unwrap_or_else(|_| default_app_host()),
            port: var_or("APP_PORT", default_app_port())?,
            server_version: non_empty_var("SERVER_VERSION").unwrap_or_else(default_server_version),
        };

        let log = LogConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            format: match env::var("LOG_FORMAT") {
                Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        };

        let driver = match env::var("DRIVER") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "DRIVER",
                value,
            })?,
            Err(_) => Driver::Postgres,
        };
        let database = DatabaseConfig {
            driver,
            url: non_empty_var("DATABASE_URL"),
            max_connections: var_or("DATABASE_MAX_CONNECTIONS", default_db_max_connections())?,
            query_timeout_secs: var_or(
                "DATABASE_QUERY_TIMEOUT_SECS",
                default_db_query_timeout_secs(),
            )?,
        };
        if database.query_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "DATABASE_QUERY_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        if database.driver == Driver::Postgres && database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let session: SessionConfig = envy::prefixed("SESSION_").from_env()?;
        if session.ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_HOURS",
                value: session.ttl_hours.to_string(),
            });
        }
        if session.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_SWEEP_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let jwt = JwtConfig {
            secret: non_empty_var("SECRET_KEY").ok_or(ConfigError::Missing("SECRET_KEY"))?,
        };

        let api: ApiConfig = envy::prefixed("API_").from_env()?;

        let cors = CorsConfig {
            allowed_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let oauth2: OAuth2Config = envy::prefixed("OAUTH2_").from_env()?;

        Ok(Config {
            app,
            log,
            database,
            session,
            jwt,
            api,
            cors,
            oauth2,
        })
    }

    /// Development defaults on the in-memory driver, without reading the
    /// environment.
    pub fn memory(secret: &str) -> Self {
        Config {
            app: AppConfig {
                env: default_app_env(),
                host: default_app_host(),
                port: default_app_port(),
                server_version: default_server_version(),
            },
            log: LogConfig {
                level: default_log_level(),
                format: LogFormat::Text,
            },
            database: DatabaseConfig {
                driver: Driver::Memory,
                url: None,
                max_connections: default_db_max_connections(),
                query_timeout_secs: default_db_query_timeout_secs(),
            },
            session: SessionConfig {
                ttl_hours: default_session_ttl_hours(),
                sweep_interval_secs: default_session_sweep_interval_secs(),
            },
            jwt: JwtConfig {
                secret: secret.to_string(),
            },
            api: ApiConfig {
                default_version: default_api_version(),
                min_version: default_api_version(),
            },
            cors: CorsConfig::default(),
            oauth2: OAuth2Config::default(),
        }
    }
}
