use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "DoseRisk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point protected views redirect to when no identity is present.
pub const LOGIN_ROUTE: &str = "/login";

/// Fallback re-check interval for the session gate.
pub const SESSION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Environment variable overriding the prediction service base URL.
pub const API_URL_ENV: &str = "DOSERISK_API_URL";

/// Default prediction service base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Get the application data directory
/// ~/DoseRisk/ on all platforms
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
    home.join(APP_NAME)
}

/// Path of the shared local store (identity, cached profiles, pins, preferences).
pub fn store_path() -> PathBuf {
    app_data_dir().join("doserisk.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "doserisk=debug,warn"
    } else {
        "doserisk=info,warn"
    }
}

// ═══════════════════════════════════════════════════════════
// Remote boundary
// ═══════════════════════════════════════════════════════════

/// Bounded retry with exponential backoff for remote requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 0.0–1.0, applied symmetrically around the exponential delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Connection settings for the prediction service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        }
    }
}

impl RemoteConfig {
    /// Defaults, with the base URL taken from `DOSERISK_API_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        config
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}
