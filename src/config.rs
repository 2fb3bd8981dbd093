use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::services::threshold::ThresholdPolicy;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Capacity and threshold defaults applied when an inventory record is
/// created lazily for a location tier.
#[derive(Clone, Debug, Deserialize)]
pub struct TierDefaults {
    pub total_stock: i32,
    pub min_threshold: i32,
    pub max_threshold: i32,
}

/// One sales region: its regional warehouse and the stores it serves.
#[derive(Clone, Debug, Deserialize)]
pub struct Region {
    /// Region key embedded in location ids (e.g. "EAST" in "STORE-EAST-01")
    pub key: String,
    pub warehouse_id: String,
    pub warehouse_name: String,
    pub stores: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
}

/// Topology and policy of the retail network.
///
/// Injected into the services instead of living as module-level constants so
/// tests can substitute fixtures.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub store_prefix: String,
    pub central_warehouse_id: String,
    pub central_warehouse_name: String,
    pub regions: Vec<Region>,
    pub store_defaults: TierDefaults,
    pub warehouse_defaults: TierDefaults,
    pub central_defaults: TierDefaults,
    pub products: Vec<CatalogProduct>,
    pub replenishment: ThresholdPolicy,
    /// Estimated days until a replenishment request is delivered
    pub request_lead_days: i64,
    /// Estimated days until an allocated transfer arrives at its destination
    pub receiving_eta_days: i64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let region = |key: &str, name: &str| Region {
            key: key.to_string(),
            warehouse_id: format!("WH-{}", key),
            warehouse_name: format!("{} Warehouse", name),
            stores: vec![format!("STORE-{}-01", key), format!("STORE-{}-02", key)],
        };

        Self {
            store_prefix: "STORE-".to_string(),
            central_warehouse_id: "WH-CENTRAL".to_string(),
            central_warehouse_name: "Central Warehouse".to_string(),
            regions: vec![
                region("EAST", "East"),
                region("WEST", "West"),
                region("NORTH", "North"),
                region("SOUTH", "South"),
            ],
            store_defaults: TierDefaults {
                total_stock: 200,
                min_threshold: 60,
                max_threshold: 200,
            },
            warehouse_defaults: TierDefaults {
                total_stock: 1000,
                min_threshold: 100,
                max_threshold: 2000,
            },
            central_defaults: TierDefaults {
                total_stock: 200,
                min_threshold: 0,
                max_threshold: 500,
            },
            products: vec![
                ("PROD-001", "Casual T-Shirt"),
                ("PROD-002", "Classic Denim Jeans"),
                ("PROD-003", "Hooded Sweatshirt"),
                ("PROD-004", "Chino Pants"),
                ("PROD-005", "Polo Shirt"),
                ("PROD-006", "Jogger Pants"),
            ]
            .into_iter()
            .map(|(id, name)| CatalogProduct {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect(),
            replenishment: ThresholdPolicy::default(),
            request_lead_days: 3,
            receiving_eta_days: 2,
        }
    }
}

impl NetworkConfig {
    pub fn is_store(&self, location_id: &str) -> bool {
        location_id.starts_with(&self.store_prefix)
    }

    pub fn is_regional_warehouse(&self, location_id: &str) -> bool {
        self.regions.iter().any(|r| r.warehouse_id == location_id)
    }

    pub fn is_central_warehouse(&self, location_id: &str) -> bool {
        location_id == self.central_warehouse_id
    }

    /// Resident regional warehouse for a store, matched by the region key
    /// embedded in the store id.
    pub fn region_for_store(&self, location_id: &str) -> Option<&Region> {
        if !self.is_store(location_id) {
            return None;
        }
        self.regions.iter().find(|r| location_id.contains(&r.key))
    }

    pub fn region_for_warehouse(&self, warehouse_id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.warehouse_id == warehouse_id)
    }

    /// Region key stored on inventory records ("ALL" for the central tier).
    pub fn region_key(&self, location_id: &str) -> Option<String> {
        if self.is_central_warehouse(location_id) {
            return Some("ALL".to_string());
        }
        self.regions
            .iter()
            .find(|r| r.warehouse_id == location_id || location_id.contains(&r.key))
            .map(|r| r.key.clone())
    }

    /// Stores eligible for shipment fallback in the same region as `store_id`
    /// (includes `store_id` itself).
    pub fn sibling_stores(&self, store_id: &str) -> Vec<String> {
        self.region_for_store(store_id)
            .map(|r| r.stores.clone())
            .unwrap_or_else(|| vec![store_id.to_string()])
    }

    pub fn tier_defaults(&self, location_id: &str) -> &TierDefaults {
        if self.is_regional_warehouse(location_id) {
            &self.warehouse_defaults
        } else if self.is_store(location_id) {
            &self.store_defaults
        } else {
            &self.central_defaults
        }
    }

    pub fn product_name(&self, product_id: &str) -> Option<&str> {
        self.products
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.name.as_str())
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

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

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

    /// Request timeout applied at the HTTP layer (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Retail network topology and replenishment policy
    #[serde(default)]
    pub network: NetworkConfig,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Creates a new configuration with defaults for everything not passed in
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            network: NetworkConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
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

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        return Err(ValidationError::new("event_channel_capacity_zero"));
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("retailnet_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://retailnet.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
