use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_SIGNING_SECRET: &str = "development_checkout_signing_secret_do_not_ship";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// sea-orm connection URL. Without one the service keeps its state in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Create missing tables from the entity definitions on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Shared HMAC key for checkout signatures
    #[validate(length(min = 32), custom = "validate_signing_secret")]
    pub checkout_signing_secret: String,

    /// Gateway wallet receiving the platform fee
    #[validate(length(min = 1))]
    pub platform_wallet_id: String,

    /// Platform fee in percent of every sale
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: Decimal,

    /// Commission offered by invitations that do not state one
    #[serde(default = "default_affiliate_commission")]
    pub default_affiliate_commission: Decimal,

    /// Webhook of the external payment workflow
    #[serde(default)]
    pub payment_workflow_url: Option<String>,

    /// Upper bound for one payment-workflow call, in seconds
    #[serde(default = "default_payment_workflow_timeout_secs")]
    #[validate(range(min = 1, max = 60))]
    pub payment_workflow_timeout_secs: u64,

    /// Rejection-sampling budget for new affiliate codes
    #[serde(default = "default_affiliate_code_attempts")]
    #[validate(range(min = 1))]
    pub affiliate_code_attempts: u32,

    /// Lifetime of cached company lookups, in seconds
    #[serde(default = "default_company_cache_ttl_secs")]
    pub company_cache_ttl_secs: u64,

    /// Public URL of the storefront, used for payment callbacks
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
}

impl AppConfig {
    /// Configuration with defaults for everything except the two required keys.
    pub fn new(checkout_signing_secret: String, platform_wallet_id: String) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: default_port(),
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            database_url: None,
            auto_migrate: false,
            checkout_signing_secret,
            platform_wallet_id,
            platform_fee_percent: default_platform_fee_percent(),
            default_affiliate_commission: default_affiliate_commission(),
            payment_workflow_url: None,
            payment_workflow_timeout_secs: default_payment_workflow_timeout_secs(),
            affiliate_code_attempts: default_affiliate_code_attempts(),
            company_cache_ttl_secs: default_company_cache_ttl_secs(),
            app_base_url: default_app_base_url(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn payment_workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_workflow_timeout_secs)
    }

    pub fn company_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.company_cache_ttl_secs)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.platform_fee_percent <= Decimal::ZERO || self.platform_fee_percent >= dec!(100) {
            let mut err = ValidationError::new("platform_fee_percent");
            err.message = Some("platform_fee_percent must be between 0 and 100 (exclusive)".into());
            errors.add("platform_fee_percent", err);
        }

        let max_commission = dec!(100) - self.platform_fee_percent;
        if self.default_affiliate_commission < Decimal::ZERO
            || self.default_affiliate_commission > max_commission
        {
            let mut err = ValidationError::new("default_affiliate_commission");
            err.message = Some(
                format!(
                    "default_affiliate_commission must be between 0 and {}",
                    max_commission
                )
                .into(),
            );
            errors.add("default_affiliate_commission", err);
        }

        if !self.is_development() && self.checkout_signing_secret.trim() == DEV_DEFAULT_SIGNING_SECRET
        {
            let mut err = ValidationError::new("checkout_signing_secret_default_dev");
            err.message = Some(
                "The bundled development signing secret must not be used outside development. Set APP__CHECKOUT_SIGNING_SECRET."
                    .into(),
            );
            errors.add("checkout_signing_secret", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_platform_fee_percent() -> Decimal {
    dec!(8)
}

fn default_affiliate_commission() -> Decimal {
    dec!(10)
}

fn default_payment_workflow_timeout_secs() -> u64 {
    5
}

fn default_affiliate_code_attempts() -> u32 {
    10
}

fn default_company_cache_ttl_secs() -> u64 {
    300
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_signing_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("checkout_signing_secret");
            err.message = Some("Signing secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("checkout_signing_secret");
        err.message = Some("Signing secret must have at least 10 unique characters".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("xeco_checkout={},tower_http=debug", level);
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
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
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
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("checkout_signing_secret").is_err() {
        error!("Checkout signing secret is not configured. Set APP__CHECKOUT_SIGNING_SECRET (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "checkout_signing_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "k3y-For-Checkout-Signatures-0123456789";

    fn base_config() -> AppConfig {
        AppConfig::new(SECRET.to_string(), "wallet-platform".to_string())
    }

    #[test]
    fn defaults_are_valid() {
        let config = base_config();
        assert!(config.validate().is_ok());
        assert!(config.validate_additional_constraints().is_ok());
        assert_eq!(config.platform_fee_percent, dec!(8));
        assert_eq!(config.payment_workflow_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut config = base_config();
        config.checkout_signing_secret = "too-short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn repeated_character_secret_is_rejected() {
        assert!(validate_signing_secret(&"a".repeat(40)).is_err());
        assert!(validate_signing_secret(SECRET).is_ok());
    }

    #[test]
    fn dev_secret_is_rejected_outside_development() {
        let mut config = base_config();
        config.checkout_signing_secret = DEV_DEFAULT_SIGNING_SECRET.into();
        assert!(config.validate_additional_constraints().is_ok());
        config.environment = "production".into();
        assert!(config.validate_additional_constraints().is_err());
    }

    #[test]
    fn commission_cannot_exceed_what_the_fee_leaves() {
        let mut config = base_config();
        config.default_affiliate_commission = dec!(93);
        assert!(config.validate_additional_constraints().is_err());
        config.default_affiliate_commission = dec!(92);
        assert!(config.validate_additional_constraints().is_ok());
    }

    #[test]
    fn workflow_timeout_is_bounded() {
        let mut config = base_config();
        config.payment_workflow_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.payment_workflow_timeout_secs = 61;
        assert!(config.validate().is_err());
    }
}
