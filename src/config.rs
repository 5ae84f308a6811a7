use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "GATEHOUSE_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long = "db-max-connections", env = "GATEHOUSE_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// How long to wait for a free connection before failing
    #[arg(long = "db-acquire-timeout-secs", env = "GATEHOUSE_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "GATEHOUSE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "GATEHOUSE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, env = "GATEHOUSE_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for JWT signing (HS256)
    #[arg(long, env = "GATEHOUSE_JWT_SECRET")]
    pub jwt_secret: String,

    /// Issuer embedded in and required of access tokens; unchecked when unset
    #[arg(long, env = "GATEHOUSE_JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Audience embedded in and required of access tokens; unchecked when unset
    #[arg(long, env = "GATEHOUSE_JWT_AUDIENCE")]
    pub jwt_audience: Option<String>,

    /// Access token time-to-live in minutes
    #[arg(long, env = "GATEHOUSE_ACCESS_TOKEN_TTL_MINUTES", default_value_t = 60)]
    pub access_token_ttl_minutes: i64,

    /// Refresh token time-to-live in days
    #[arg(long, env = "GATEHOUSE_REFRESH_TOKEN_TTL_DAYS", default_value_t = 7)]
    pub refresh_token_ttl_days: i64,

    /// Role name (case-insensitive) that marks a user as privileged
    #[arg(long, env = "GATEHOUSE_ADMIN_ROLE", default_value = "admin")]
    pub admin_role: String,

    /// Redirect hint handed to privileged users after login
    #[arg(long, env = "GATEHOUSE_ADMIN_REDIRECT", default_value = "/admin/dashboard")]
    pub admin_redirect: String,

    /// Redirect hint handed to everyone else
    #[arg(long, env = "GATEHOUSE_DEFAULT_REDIRECT", default_value = "/home")]
    pub default_redirect: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "GATEHOUSE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
