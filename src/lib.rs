pub mod config;
pub mod db;
pub mod models;
pub mod store; // Shared local key space + pins
pub mod session; // Session gate across open views
pub mod roster;
pub mod mme;
pub mod remote; // Prediction service boundary (HTTP + mock)
pub mod assessment;
pub mod history;
pub mod profile_cache;
pub mod preferences;
pub mod workflow; // Info → Medications → Results
pub mod core_state;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over the default filter.
/// Calling it again after a subscriber is set is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
