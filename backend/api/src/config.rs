//! Application configuration loaded from environment variables.

use crate::errors::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub api_port: u16,
    /// SQLite database URL
    pub database_url: String,
    /// API key for the managed identity provider (required)
    pub identity_api_key: String,
    /// Base URL of the identity provider's REST API
    pub identity_base_url: String,
    /// Geocoding API key; geocoding is disabled when unset
    pub maps_api_key: Option<String>,
    /// Geocoding endpoint
    pub maps_geocode_url: String,
    /// Push-messaging server key; push delivery is disabled when unset
    pub fcm_server_key: Option<String>,
    /// Push-messaging send endpoint
    pub fcm_send_url: String,
    /// PayPal REST credentials; payment routes fail without them
    pub paypal_client_id: Option<String>,
    pub paypal_client_secret: Option<String>,
    /// 'sandbox' or 'live'
    pub paypal_mode: String,
    /// Radius for new-post notification fan-out, in kilometres
    pub notify_radius_km: f64,
    /// Cap on how many receivers a single post notifies
    pub notify_fan_out_limit: usize,
    /// How often (in seconds) the background sweeper expires stale posts
    pub expiry_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid API_PORT".to_string()))?,
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./foodaid.db".to_string()),
            identity_api_key: env_var("IDENTITY_API_KEY").map_err(|_| {
                ApiError::Config("IDENTITY_API_KEY environment variable is required".to_string())
            })?,
            identity_base_url: env_var("IDENTITY_BASE_URL")
                .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".to_string()),
            maps_api_key: env_var("MAPS_API_KEY").ok(),
            maps_geocode_url: env_var("MAPS_GEOCODE_URL")
                .unwrap_or_else(|_| "https://maps.googleapis.com/maps/api/geocode/json".to_string()),
            fcm_server_key: env_var("FCM_SERVER_KEY").ok(),
            fcm_send_url: env_var("FCM_SEND_URL")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string()),
            paypal_client_id: env_var("PAYPAL_CLIENT_ID").ok(),
            paypal_client_secret: env_var("PAYPAL_CLIENT_SECRET").ok(),
            paypal_mode: env_var("PAYPAL_MODE").unwrap_or_else(|_| "sandbox".to_string()),
            notify_radius_km: env_var("NOTIFY_RADIUS_KM")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid NOTIFY_RADIUS_KM".to_string()))?,
            notify_fan_out_limit: env_var("NOTIFY_FAN_OUT_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid NOTIFY_FAN_OUT_LIMIT".to_string()))?,
            expiry_sweep_secs: env_var("EXPIRY_SWEEP_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid EXPIRY_SWEEP_SECS".to_string()))?,
        })
    }

    /// PayPal REST base URL for the configured mode.
    pub fn paypal_base_url(&self) -> &'static str {
        if self.paypal_mode == "live" {
            "https://api-m.paypal.com"
        } else {
            "https://api-m.sandbox.paypal.com"
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ApiError::Config(format!("Missing env var: {key}")))
}
