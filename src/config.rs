use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::notifications::Channel;
use crate::services::orders::ORDER_BACKUP_TARGET;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY_SYMBOL: &str = "$";
const DEFAULT_CHANNELS: &str = "sellerEmail";
const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
const DEFAULT_RESEND_FROM: &str = "Fresh&Pure Orders <onboarding@resend.dev>";
const DEFAULT_TEXTBELT_API_URL: &str = "https://textbelt.com/text";
const DEFAULT_TEXTBELT_KEY: &str = "textbelt";
const DEFAULT_CALLMEBOT_API_URL: &str = "https://api.callmebot.com/whatsapp.php";

/// Who receives the seller-side notifications
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SellerConfig {
    /// Shop name used in message headers
    #[serde(default = "default_seller_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// Mailbox that receives the order e-mail
    #[validate(email)]
    pub email: String,

    /// Phone number for seller SMS and WhatsApp messages
    #[validate(custom = "validate_phone")]
    pub phone: String,

    /// Country calling code prefixed to buyer numbers in wa.me links
    #[serde(default = "default_phone_country_code")]
    pub phone_country_code: String,
}

/// Resend (e-mail) provider settings
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailProviderConfig {
    #[serde(default = "default_resend_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_resend_from")]
    pub from: String,
}

impl Default for EmailProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_resend_api_url(),
            api_key: None,
            from: default_resend_from(),
        }
    }
}

/// TextBelt (SMS) provider settings
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmsProviderConfig {
    #[serde(default = "default_textbelt_api_url")]
    pub api_url: String,
    /// TextBelt key; "textbelt" is the free-tier key
    #[serde(default = "default_textbelt_key")]
    pub api_key: Option<String>,
}

impl Default for SmsProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_textbelt_api_url(),
            api_key: default_textbelt_key(),
        }
    }
}

/// CallMeBot (WhatsApp) provider settings
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppProviderConfig {
    #[serde(default = "default_callmebot_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for WhatsAppProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_callmebot_api_url(),
            api_key: None,
        }
    }
}

/// Notification pipeline configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Comma-separated list of active channels, attempted in this order.
    /// Example: "sellerEmail,buyerSMS,sellerWhatsApp"
    #[serde(default = "default_channels")]
    pub channels: String,

    /// Upper bound for a single channel attempt, in seconds
    #[serde(default = "default_notification_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub timeout_secs: u64,

    #[serde(default)]
    pub email: EmailProviderConfig,

    #[serde(default)]
    pub sms: SmsProviderConfig,

    #[serde(default)]
    pub whatsapp: WhatsAppProviderConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            timeout_secs: default_notification_timeout_secs(),
            email: EmailProviderConfig::default(),
            sms: SmsProviderConfig::default(),
            whatsapp: WhatsAppProviderConfig::default(),
        }
    }
}

impl NotificationsConfig {
    /// Parses the configured channel list, rejecting unknown names and duplicates.
    pub fn channel_list(&self) -> Result<Vec<Channel>, String> {
        let mut channels = Vec::new();
        for raw in self.channels.split(',') {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            let channel: Channel = name
                .parse()
                .map_err(|_| format!("unknown notification channel '{}'", name))?;
            if channels.contains(&channel) {
                return Err(format!("notification channel '{}' listed twice", name));
            }
            channels.push(channel);
        }
        Ok(channels)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn provider_key_for(&self, channel: Channel) -> Option<&str> {
        let key = match channel {
            Channel::SellerEmail => self.email.api_key.as_deref(),
            Channel::BuyerSms | Channel::SellerSms => self.sms.api_key.as_deref(),
            Channel::BuyerWhatsApp | Channel::SellerWhatsApp => self.whatsapp.api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

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

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Currency symbol prefixed to prices and totals
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    #[validate]
    pub seller: SellerConfig,

    #[serde(default)]
    #[validate]
    pub notifications: NotificationsConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything but the seller contact
    pub fn new(
        host: String,
        port: u16,
        environment: String,
        seller_email: String,
        seller_phone: String,
    ) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            max_body_size: default_max_body_size(),
            request_timeout_secs: default_request_timeout_secs(),
            currency_symbol: default_currency_symbol(),
            seller: SellerConfig {
                name: default_seller_name(),
                email: seller_email,
                phone: seller_phone,
                phone_country_code: default_phone_country_code(),
            },
            notifications: NotificationsConfig::default(),
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        match self.notifications.channel_list() {
            Ok(channels) => {
                if let Some(channel) = channels
                    .iter()
                    .find(|c| self.notifications.provider_key_for(**c).is_none())
                {
                    let mut err = ValidationError::new("provider_api_key_required");
                    err.message = Some(
                        format!(
                            "Channel '{}' is enabled but its provider has no api_key configured",
                            channel
                        )
                        .into(),
                    );
                    errors.add("notifications", err);
                }
            }
            Err(reason) => {
                let mut err = ValidationError::new("notification_channels");
                err.message = Some(reason.into());
                errors.add("notifications", err);
            }
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
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_body_size() -> usize {
    64 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_currency_symbol() -> String {
    DEFAULT_CURRENCY_SYMBOL.to_string()
}

fn default_seller_name() -> String {
    "Fresh&Pure Oils".to_string()
}

fn default_phone_country_code() -> String {
    "91".to_string()
}

fn default_channels() -> String {
    DEFAULT_CHANNELS.to_string()
}

fn default_notification_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}

fn default_resend_api_url() -> String {
    DEFAULT_RESEND_API_URL.to_string()
}

fn default_resend_from() -> String {
    DEFAULT_RESEND_FROM.to_string()
}

fn default_textbelt_api_url() -> String {
    DEFAULT_TEXTBELT_API_URL.to_string()
}

fn default_textbelt_key() -> Option<String> {
    Some(DEFAULT_TEXTBELT_KEY.to_string())
}

fn default_callmebot_api_url() -> String {
    DEFAULT_CALLMEBOT_API_URL.to_string()
}

/// Validates log level values
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

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = crate::notifications::message::normalize_phone(phone);
    if digits.len() < 7 {
        let mut err = ValidationError::new("phone");
        err.message = Some("Phone number must contain at least 7 digits".into());
        return Err(err);
    }
    Ok(())
}

/// Default filter: our crate, the order backup records and HTTP traces
fn default_filter_directive(level: &str) -> String {
    format!(
        "freshpure_api={level},{backup}={level},tower_http=debug",
        level = level,
        backup = ORDER_BACKUP_TARGET,
    )
}

/// `RUST_LOG` wins when set and non-empty
fn build_env_filter(level: &str, rust_log: Option<String>) -> EnvFilter {
    let directive = rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_filter_directive(level));
    EnvFilter::new(directive)
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let filter = build_env_filter(level, env::var("RUST_LOG").ok());

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
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
    // Support both RUN_ENV and APP_ENV for selecting config profile
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

    // The seller contact has no default; fail with a clear message when absent
    for key in ["seller.email", "seller.phone"] {
        if config.get_string(key).is_err() {
            let var = format!("APP__{}", key.replace('.', "__").to_ascii_uppercase());
            error!("{} is not configured. Set the {} environment variable.", key, var);
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured. Set {}.",
                key, var
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration consistency validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
