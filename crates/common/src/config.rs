//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config. Every knob has a default
//! so the core is usable without any environment at all.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// How long an invitation stays acceptable, in days
    pub invitation_ttl_days: i64,

    /// Hard ceiling on hierarchy walks; exceeding it means corruption
    pub max_hierarchy_depth: u32,

    /// Runtime configuration
    pub log_level: String,
}

impl CoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self {
            invitation_ttl_days: env::var("INVITATION_TTL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            max_hierarchy_depth: env::var("MAX_HIERARCHY_DEPTH")
                .unwrap_or_else(|_| "32".to_string())
                .parse()
                .unwrap_or(32),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            invitation_ttl_days: 7,
            max_hierarchy_depth: 32,
            log_level: "info".to_string(),
        }
    }
}
