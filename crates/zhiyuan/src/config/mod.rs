use crate::admissions::band::{BandOffsets, BandTable, Strategy};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub data: DataConfig,
    pub report: ReportSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8031".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let data = DataConfig {
            physics_table: env_path("APP_PHYSICS_TABLE", "data/ranking_score_physics.json"),
            history_table: env_path("APP_HISTORY_TABLE", "data/ranking_score_history.json"),
            store: StoreKind::from_env(env::var("APP_STORE").ok().as_deref())?,
            sqlite_path: env_path("APP_SQLITE_PATH", "data/admissions.sqlite3"),
            admissions_csv: env::var("APP_ADMISSIONS_CSV")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };

        let mut bands = BandTable::default();
        for (variable, strategy) in [
            ("APP_BAND_BLENDED", Strategy::Blended),
            ("APP_BAND_REACH", Strategy::Reach),
            ("APP_BAND_MATCH", Strategy::Match),
            ("APP_BAND_SAFE", Strategy::Safe),
        ] {
            if let Ok(raw) = env::var(variable) {
                let offsets = parse_band(variable, &raw)?;
                bands = bands.with_offsets(strategy, offsets);
            }
        }

        let report = ReportSettings {
            reference_year: env_number("APP_REFERENCE_YEAR", 2024)?,
            fallback_score: env_number("APP_FALLBACK_SCORE", 500)?,
            max_page_size: env_number("APP_MAX_PAGE_SIZE", 100)?,
            bands,
        };

        if report.max_page_size == 0 {
            return Err(ConfigError::InvalidNumber {
                variable: "APP_MAX_PAGE_SIZE",
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            data,
            report,
        })
    }
}

fn env_path(variable: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(variable).unwrap_or_else(|_| default.to_string()))
}

fn env_number<T: std::str::FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
    }
}

fn parse_band(variable: &'static str, raw: &str) -> Result<BandOffsets, ConfigError> {
    let invalid = || ConfigError::InvalidBand {
        variable,
        value: raw.to_string(),
    };

    let (min, max) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let min = min.trim().parse::<i32>().map_err(|_| invalid())?;
    let max = max.trim().parse::<i32>().map_err(|_| invalid())?;
    BandOffsets::new(min, max).ok_or_else(invalid)
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

/// Which backing store serves admission records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

impl StoreKind {
    fn from_env(value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(|raw| raw.trim().to_ascii_lowercase()) {
            None => Ok(Self::Memory),
            Some(raw) if raw.is_empty() || raw == "memory" => Ok(Self::Memory),
            Some(raw) if raw == "sqlite" => Ok(Self::Sqlite),
            Some(raw) => Err(ConfigError::UnknownStore(raw)),
        }
    }
}

/// Locations of the reference distributions and admission data.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub physics_table: PathBuf,
    pub history_table: PathBuf,
    pub store: StoreKind,
    pub sqlite_path: PathBuf,
    pub admissions_csv: Option<PathBuf>,
}

/// Report pipeline tunables.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub reference_year: u16,
    pub fallback_score: i32,
    pub max_page_size: u32,
    pub bands: BandTable,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            reference_year: 2024,
            fallback_score: 500,
            max_page_size: 100,
            bands: BandTable::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    InvalidBand { variable: &'static str, value: String },
    UnknownStore(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a valid positive number")
            }
            ConfigError::InvalidBand { variable, value } => write!(
                f,
                "{variable} must look like 'min:max' with min <= max, got '{value}'"
            ),
            ConfigError::UnknownStore(value) => {
                write!(f, "APP_STORE must be 'memory' or 'sqlite', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
