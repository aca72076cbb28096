//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ORDERLY_DB_PATH=/var/lib/orderly/orderly.db                        │
//! │     ORDERLY_SHIPPING_CENTS=500                                         │
//! │     ORDERLY_DEFAULT_VAT_BPS=1500                                       │
//! │     ORDERLY_ORDER_NUMBER_ATTEMPTS=5                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/orderly/engine.toml (Linux)                              │
//! │     ~/Library/Application Support/dev.orderly.orderly/engine.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "orderly.db"
//! max_connections = 5
//!
//! [checkout]
//! shipping_cents = 0
//! default_vat_rate_bps = 1500
//! order_number_attempts = 5
//!
//! [notifications]
//! batch_size = 50
//! max_attempts = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("orderly.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Checkout pricing inputs that are constants at this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Flat shipping charged on every order.
    #[serde(default)]
    pub shipping_cents: i64,

    /// VAT used when no `vat_rates` row matches the shipping address.
    #[serde(default = "default_vat_rate_bps")]
    pub default_vat_rate_bps: u32,

    /// Insert attempts before an order-number collision becomes a Conflict.
    #[serde(default = "default_order_number_attempts")]
    pub order_number_attempts: u32,
}

fn default_vat_rate_bps() -> u32 {
    orderly_core::DEFAULT_VAT_RATE_BPS
}

fn default_order_number_attempts() -> u32 {
    5
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            shipping_cents: 0,
            default_vat_rate_bps: default_vat_rate_bps(),
            order_number_attempts: default_order_number_attempts(),
        }
    }
}

/// Outbox delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Pending rows fetched per dispatch pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Rows that failed this many times are skipped (and logged).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
}

fn default_batch_size() -> u32 {
    50
}

fn default_max_attempts() -> i64 {
    10
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl EngineConfig {
    /// Loads configuration: file (if present), then env overrides, then validation.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> DbResult<String> {
        toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config("database.max_connections must be greater than 0".into()));
        }

        if self.checkout.shipping_cents < 0 {
            return Err(DbError::Config("checkout.shipping_cents must not be negative".into()));
        }

        if self.checkout.default_vat_rate_bps > 10_000 {
            return Err(DbError::Config(format!(
                "checkout.default_vat_rate_bps must be at most 10000, got {}",
                self.checkout.default_vat_rate_bps
            )));
        }

        if self.checkout.order_number_attempts == 0 {
            return Err(DbError::Config(
                "checkout.order_number_attempts must be greater than 0".into(),
            ));
        }

        if self.notifications.batch_size == 0 {
            return Err(DbError::Config("notifications.batch_size must be greater than 0".into()));
        }

        if self.notifications.max_attempts <= 0 {
            return Err(DbError::Config(
                "notifications.max_attempts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("ORDERLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(value) = std::env::var("ORDERLY_SHIPPING_CENTS") {
            match value.parse::<i64>() {
                Ok(cents) => self.checkout.shipping_cents = cents,
                Err(_) => warn!(value = %value, "Ignoring invalid ORDERLY_SHIPPING_CENTS"),
            }
        }

        if let Ok(value) = std::env::var("ORDERLY_DEFAULT_VAT_BPS") {
            match value.parse::<u32>() {
                Ok(bps) => self.checkout.default_vat_rate_bps = bps,
                Err(_) => warn!(value = %value, "Ignoring invalid ORDERLY_DEFAULT_VAT_BPS"),
            }
        }

        if let Ok(value) = std::env::var("ORDERLY_ORDER_NUMBER_ATTEMPTS") {
            match value.parse::<u32>() {
                Ok(attempts) => self.checkout.order_number_attempts = attempts,
                Err(_) => warn!(value = %value, "Ignoring invalid ORDERLY_ORDER_NUMBER_ATTEMPTS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "orderly", "orderly")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.checkout.shipping_cents, 0);
        assert_eq!(config.checkout.default_vat_rate_bps, 1500);
        assert_eq!(config.checkout.order_number_attempts, 5);
        assert_eq!(config.notifications.max_attempts, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [checkout]
            shipping_cents = 750
            "#,
        )
        .unwrap();
        assert_eq!(config.checkout.shipping_cents, 750);
        assert_eq!(config.checkout.default_vat_rate_bps, 1500);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.checkout.order_number_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.checkout.default_vat_rate_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.checkout.shipping_cents = -1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.notifications.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.checkout.shipping_cents = 499;
        let text = config.to_toml().unwrap();
        let parsed = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.checkout.shipping_cents, 499);
    }
}
