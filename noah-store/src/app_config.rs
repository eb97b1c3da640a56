use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub sepay: SePaySettings,
    pub booking: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// QR-transfer provider credentials and endpoints.
#[derive(Debug, Deserialize, Clone)]
pub struct SePaySettings {
    pub api_token: String,
    pub transactions_url: String,
    #[serde(default = "default_qr_base_url")]
    pub qr_base_url: String,
    pub bank_id: String,
    pub account_number: String,
    #[serde(default = "default_account_name")]
    pub account_name: String,
}

fn default_qr_base_url() -> String {
    "https://qr.sepay.vn/img".to_string()
}

fn default_account_name() -> String {
    "NOAH BUILDING MANAGEMENT".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// Wall-clock offset used to compute "today" for booking windows.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i64,
    /// How long a payment QR stays valid.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_utc_offset() -> i64 {
    7
}

fn default_session_ttl() -> u64 {
    5 * 60
}

fn default_poll_interval() -> u64 {
    3
}

fn default_sweep_interval() -> u64 {
    60
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // NOAH__SERVER__PORT=9090 style overrides
            .add_source(config::Environment::with_prefix("NOAH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
