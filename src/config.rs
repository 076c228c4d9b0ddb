/*
 * Responsibility
 * - Read process configuration from the environment (.env is honoured)
 * - Validate it once at start-up (missing or malformed values abort the boot)
 * - The resulting Config is immutable and shared by reference
 */
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ADMIN_ROLE: &str = "ADMIN";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub admin_role: String,
    pub jwt_secret: String,

    pub upstream_url: Url,
    pub metadata_url: Url,

    pub upstream_connect_timeout: Duration,
    pub upstream_read_timeout: Duration,
    pub metadata_timeout: Duration,

    pub max_upload_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // jwt_secret stays out of logs
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("admin_role", &self.admin_role)
            .field("upstream_url", &self.upstream_url.as_str())
            .field("metadata_url", &self.metadata_url.as_str())
            .field("upstream_connect_timeout", &self.upstream_connect_timeout)
            .field("upstream_read_timeout", &self.upstream_read_timeout)
            .field("metadata_timeout", &self.metadata_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a Config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT"))?,
            None => DEFAULT_PORT,
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let admin_role = lookup("ADMIN_ROLE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_ROLE.to_string());

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let upstream_url = required_url(&lookup, "UPSTREAM_URL")?;
        let metadata_url = required_url(&lookup, "METADATA_URL")?;

        let upstream_connect_timeout =
            seconds_or(&lookup, "UPSTREAM_CONNECT_TIMEOUT_SECONDS", 5)?;
        let upstream_read_timeout = seconds_or(&lookup, "UPSTREAM_READ_TIMEOUT_SECONDS", 60)?;
        let metadata_timeout = seconds_or(&lookup, "METADATA_TIMEOUT_SECONDS", 10)?;

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("MAX_UPLOAD_BYTES"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            addr,
            app_env,
            admin_role,
            jwt_secret,
            upstream_url,
            metadata_url,
            upstream_connect_timeout,
            upstream_read_timeout,
            metadata_timeout,
            max_upload_bytes,
        })
    }
}

fn required_url<F>(lookup: &F, key: &'static str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).ok_or(ConfigError::Missing(key))?;
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid(key))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::Invalid(key));
    }
    Ok(url)
}

fn seconds_or<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid(key)),
        None => Ok(Duration::from_secs(default)),
    }
}
