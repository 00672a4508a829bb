use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DRAFT_TTL_HOURS: i64 = 24;
const DEFAULT_VIEW_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_ORDER_NUMBER_RETRIES: u32 = 5;

/// Supplier webhook egress/ingress configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SupplierConfig {
    /// Shared static API key expected on inbound callbacks and sent on
    /// outbound webhook requests
    #[validate(length(min = 16))]
    pub api_key: String,

    /// Timeout for outbound webhook HTTP calls, in seconds
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            api_key: "dev-supplier-api-key-not-for-production".to_string(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Rolling TTL for order drafts, in hours
    #[serde(default = "default_draft_ttl_hours")]
    pub draft_ttl_hours: i64,

    /// TTL for the per-tenant view cache, in seconds
    #[serde(default = "default_view_cache_ttl_secs")]
    pub view_cache_ttl_secs: u64,

    /// Bounded retry count for order-number collisions
    #[serde(default = "default_order_number_retries")]
    pub order_number_retries: u32,

    /// Supplier webhook configuration
    #[serde(default)]
    #[validate]
    pub supplier: SupplierConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_env() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_draft_ttl_hours() -> i64 {
    DEFAULT_DRAFT_TTL_HOURS
}
fn default_view_cache_ttl_secs() -> u64 {
    DEFAULT_VIEW_CACHE_TTL_SECS
}
fn default_webhook_timeout_secs() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_SECS
}
fn default_order_number_retries() -> u32 {
    DEFAULT_ORDER_NUMBER_RETRIES
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Loads configuration from layered sources: base file, environment-specific
/// file, then `APP_`-prefixed environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("database_url", "sqlite://medistock.db?mode=rwc")?;

    let base_path = Path::new(CONFIG_DIR).join("default");
    if base_path.with_extension("toml").exists() {
        builder = builder.add_source(File::from(base_path).required(false));
    }

    let env_path = Path::new(CONFIG_DIR).join(&environment);
    if env_path.with_extension("toml").exists() {
        builder = builder.add_source(File::from(env_path).required(false));
    }

    let settings = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;

    config.validate().map_err(|e| {
        ConfigError::Message(format!("Configuration validation failed: {}", e))
    })?;

    info!(
        environment = %config.environment,
        port = config.port,
        auto_migrate = config.auto_migrate,
        "Configuration loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            draft_ttl_hours: default_draft_ttl_hours(),
            view_cache_ttl_secs: default_view_cache_ttl_secs(),
            order_number_retries: default_order_number_retries(),
            supplier: SupplierConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn short_api_key_fails_validation() {
        let mut config = minimal_config();
        config.supplier.api_key = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_detection_is_case_insensitive() {
        let mut config = minimal_config();
        config.environment = "Production".to_string();
        assert!(config.is_production());
    }
}
