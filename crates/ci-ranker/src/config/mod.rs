use crate::grants::{BroadCodePolicy, QuerySettings, DEFAULT_GRANT_URL_TEMPLATE};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;

const DEFAULT_DATASET_PATH: &str = "./arc_discovery_projects_2010_2025_with_for.csv";
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub dataset: DatasetConfig,
    pub query: QueryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dataset_path = env::var("APP_DATASET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATASET_PATH));

        let cache_capacity = env::var("APP_CACHE_CAPACITY")
            .unwrap_or_else(|_| DEFAULT_CACHE_CAPACITY.to_string())
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::InvalidCacheCapacity)?;

        let grant_url_template = env::var("APP_GRANT_URL_TEMPLATE")
            .unwrap_or_else(|_| DEFAULT_GRANT_URL_TEMPLATE.to_string());
        if !grant_url_template.contains("{code}") {
            return Err(ConfigError::InvalidUrlTemplate);
        }

        let broad_code_policy = match env::var("APP_BROAD_CODE_POLICY") {
            Ok(raw) => BroadCodePolicy::parse(&raw)
                .ok_or(ConfigError::InvalidBroadCodePolicy { value: raw })?,
            Err(_) => BroadCodePolicy::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            dataset: DatasetConfig { path: dataset_path },
            query: QueryConfig {
                cache_capacity,
                grant_url_template,
                broad_code_policy,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the grants CSV read once at startup.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub path: PathBuf,
}

/// Ranking cache bound and detail rendering options.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub cache_capacity: NonZeroUsize,
    pub grant_url_template: String,
    pub broad_code_policy: BroadCodePolicy,
}

impl QueryConfig {
    pub fn settings(&self) -> QuerySettings {
        QuerySettings {
            broad_code_policy: self.broad_code_policy,
            grant_url_template: self.grant_url_template.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCacheCapacity,
    InvalidUrlTemplate,
    InvalidBroadCodePolicy { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCacheCapacity => {
                write!(f, "APP_CACHE_CAPACITY must be a positive integer")
            }
            ConfigError::InvalidUrlTemplate => {
                write!(f, "APP_GRANT_URL_TEMPLATE must contain a {{code}} placeholder")
            }
            ConfigError::InvalidBroadCodePolicy { value } => write!(
                f,
                "APP_BROAD_CODE_POLICY '{value}' must be 'precedence' or 'intersect'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCacheCapacity
            | ConfigError::InvalidUrlTemplate
            | ConfigError::InvalidBroadCodePolicy { .. } => None,
        }
    }
}
