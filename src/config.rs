//! Environment-driven configuration
//!
//! Every knob has a default suitable for local development; a `.env`
//! file is loaded by the binary before [`Config::from_env`] runs.

use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub affiliates: AffiliateConfig,
    pub tracker: TrackerConfig,
    pub clicks: ClickConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// `memory` or `file`
    pub backend: String,
    pub file_path: String,
}

#[derive(Clone, Debug)]
pub struct AffiliateConfig {
    /// `memory` or `rest`
    pub backend: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Query parameter carrying the referral code on inbound URLs.
    pub referral_param: String,
    /// Attribution window in days.
    pub window_days: i64,
}

#[derive(Clone, Debug)]
pub struct ClickConfig {
    pub flush_interval_secs: u64,
    pub flush_threshold: usize,
}

pub const DEFAULT_REFERRAL_PARAM: &str = "ref";
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

impl Config {
    pub fn from_env() -> Self {
        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8080),
            },
            store: StoreConfig {
                backend: env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
                file_path: env::var("STORE_FILE")
                    .unwrap_or_else(|_| "attributions.json".to_string()),
            },
            affiliates: AffiliateConfig {
                backend: env::var("AFFILIATE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
                api_url: env::var("AFFILIATE_API_URL").ok(),
                api_key: env::var("AFFILIATE_API_KEY").ok(),
            },
            tracker: TrackerConfig {
                referral_param: env::var("REFERRAL_PARAM")
                    .unwrap_or_else(|_| DEFAULT_REFERRAL_PARAM.to_string()),
                window_days: env::var("REFERRAL_WINDOW_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_WINDOW_DAYS),
            },
            clicks: ClickConfig {
                flush_interval_secs: env::var("CLICK_FLUSH_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                flush_threshold: env::var("CLICK_FLUSH_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
            },
        }
    }
}

impl TrackerConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.window_days)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            referral_param: DEFAULT_REFERRAL_PARAM.to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}
