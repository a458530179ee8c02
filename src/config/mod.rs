//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::str::FromStr;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;
use uuid::Uuid;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "kasa";
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:54321/rest/v1/";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_MINUTES: u64 = 5;
const DEFAULT_CACHE_MAX_ENTRIES: u64 = 256;
const DEFAULT_DISCOVERY_PAGE_SIZE: u32 = crate::application::feed::DEFAULT_PAGE_SIZE;

/// Command-line arguments for the kasa binary.
#[derive(Debug, Parser)]
#[command(name = "kasa", version, about = "Kasa listing discovery")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "KASA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Search listings and page through the results.
    Search(Box<SearchArgs>),
    /// Show one listing with its owner profile.
    Listing(ListingArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Match city or neighborhood (case-insensitive substring).
    #[arg(long, value_name = "NAME")]
    pub city: Option<String>,

    /// Exact property type (apartment, house, studio, ...).
    #[arg(long = "property-type", value_name = "TYPE")]
    pub property_type: Option<String>,

    /// Minimum monthly price.
    #[arg(long = "min-price", value_name = "AMOUNT")]
    pub min_price: Option<String>,

    /// Maximum monthly price.
    #[arg(long = "max-price", value_name = "AMOUNT")]
    pub max_price: Option<String>,

    /// Minimum number of bedrooms.
    #[arg(long = "min-bedrooms", value_name = "COUNT")]
    pub min_bedrooms: Option<String>,

    /// Maximum number of bedrooms.
    #[arg(long = "max-bedrooms", value_name = "COUNT")]
    pub max_bedrooms: Option<String>,

    /// Minimum surface area in square meters.
    #[arg(long = "min-surface", value_name = "SQM")]
    pub min_surface: Option<String>,

    /// Maximum surface area in square meters.
    #[arg(long = "max-surface", value_name = "SQM")]
    pub max_surface: Option<String>,

    /// Listing status (available, rented, pending, ...).
    #[arg(long, value_name = "STATUS")]
    pub status: Option<String>,

    /// Sort order (newest|price_asc|price_desc).
    #[arg(long, value_name = "ORDER")]
    pub sort: Option<String>,

    /// Number of pages to load before stopping.
    #[arg(long, default_value_t = 1, value_name = "COUNT")]
    pub pages: u32,

    /// Print raw JSON instead of a table.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListingArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Listing id.
    #[arg(value_name = "ID")]
    pub id: Uuid,

    /// Print raw JSON instead of a summary.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the listing backend base URL.
    #[arg(long = "backend-url", value_name = "URL")]
    pub backend_url: Option<String>,

    /// Override the listing backend API key.
    #[arg(long = "backend-api-key", value_name = "KEY")]
    pub backend_api_key: Option<String>,

    /// Override the backend request timeout.
    #[arg(long = "backend-timeout-seconds", value_name = "SECONDS")]
    pub backend_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the query cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the query cache TTL.
    #[arg(long = "cache-ttl-minutes", value_name = "MINUTES")]
    pub cache_ttl_minutes: Option<u64>,

    /// Override the query cache capacity.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<u64>,

    /// Override the discovery page size.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<u32>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub cache: CacheSettings,
    pub discovery: DiscoverySettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: Url,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_minutes: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub page_size: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("KASA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Search(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Listing(args)) => raw.apply_overrides(&args.overrides),
        None => raw.apply_overrides(&CommonOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    backend: RawBackendSettings,
    cache: RawCacheSettings,
    discovery: RawDiscoverySettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.base_url = Some(url.clone());
        }
        if let Some(key) = overrides.backend_api_key.as_ref() {
            self.backend.api_key = Some(key.clone());
        }
        if let Some(seconds) = overrides.backend_timeout_seconds {
            self.backend.timeout_secs = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(minutes) = overrides.cache_ttl_minutes {
            self.cache.ttl_minutes = Some(minutes);
        }
        if let Some(entries) = overrides.cache_max_entries {
            self.cache.max_entries = Some(entries);
        }
        if let Some(size) = overrides.page_size {
            self.discovery.page_size = Some(size);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            backend,
            cache,
            discovery,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let backend = build_backend_settings(backend)?;
        let cache = build_cache_settings(cache)?;
        let discovery = build_discovery_settings(discovery)?;

        Ok(Self {
            logging,
            backend,
            cache,
            discovery,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let raw_url = backend
        .base_url
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("backend.base_url", format!("invalid URL: {err}")))?;

    let api_key = backend
        .api_key
        .map(|key| key.trim().to_string())
        .unwrap_or_default();

    let timeout_secs = backend.timeout_secs.unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "backend.timeout_secs",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        base_url,
        api_key,
        timeout_secs,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let enabled = cache.enabled.unwrap_or(true);

    let ttl_minutes = cache.ttl_minutes.unwrap_or(DEFAULT_CACHE_TTL_MINUTES);
    if ttl_minutes == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_minutes",
            "must be greater than zero",
        ));
    }

    let max_entries_value = cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
    if max_entries_value == 0 {
        return Err(LoadError::invalid(
            "cache.max_entries",
            "must be greater than zero",
        ));
    }
    let max_entries = usize::try_from(max_entries_value).map_err(|_| {
        LoadError::invalid("cache.max_entries", "value exceeds supported range for usize")
    })?;

    Ok(CacheSettings {
        enabled,
        ttl_minutes,
        max_entries,
    })
}

fn build_discovery_settings(
    discovery: RawDiscoverySettings,
) -> Result<DiscoverySettings, LoadError> {
    let page_size = discovery.page_size.unwrap_or(DEFAULT_DISCOVERY_PAGE_SIZE);
    if page_size == 0 {
        return Err(LoadError::invalid(
            "discovery.page_size",
            "must be greater than zero",
        ));
    }

    Ok(DiscoverySettings { page_size })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_minutes: Option<u64>,
    max_entries: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDiscoverySettings {
    page_size: Option<u32>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
