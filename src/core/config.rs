//! Configuration - Type-safe, validated config
//!
//! Loaded from a TOML file; connection url and credentials may be overridden
//! from the environment (`VENUE_URL`, `VENUE_USERNAME`, `VENUE_PASSWORD`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::{Error, OrdType, Result, Side, TimeInForce};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub credentials: CredentialsConfig,
    pub order: OrderConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the venue gateway
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

/// The single order the probe places and then cancels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub ord_type: OrdType,
    pub time_in_force: TimeInForce,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Client order id of the new order
    pub cl_ord_id: String,
    /// Client order id carried by the cancel request
    pub cancel_cl_ord_id: String,
    pub mass_status_req_id: String,
}

/// What happens once the venue confirms the cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Stop the receive loop and report completion
    #[default]
    Terminate,
    /// Stay connected and keep dispatching until the peer closes
    KeepAlive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Correlation id of the first request; later requests count up from here
    pub first_request_id: u64,
    pub on_cancel_confirmed: CancelPolicy,
    /// Send the cancel as soon as the order is reported working
    pub cancel_on_working: bool,
    /// Deadline for direct responses; absent means wait forever
    pub request_timeout_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { url: "ws://localhost:2345".to_string() }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: "trader".to_string(),
            password: "secret".to_string(),
        }
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            exchange: "deribit".to_string(),
            symbol: "BTC-PERPETUAL".to_string(),
            side: Side::Buy,
            ord_type: OrdType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: Decimal::ONE,
            price: Decimal::new(12345, 2),
            cl_ord_id: "test_001".to_string(),
            cancel_cl_ord_id: "test_002".to_string(),
            mass_status_req_id: "test_000".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            first_request_id: 1000,
            on_cancel_confirmed: CancelPolicy::Terminate,
            cancel_on_working: true,
            request_timeout_ms: None,
        }
    }
}

impl Config {
    /// Load from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from `path` if given, else `config.toml`, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            tracing::info!("📋 Loading config from {}", path.display());
            return Self::load(path);
        }

        let default_path = Path::new("config.toml");
        if default_path.exists() {
            tracing::info!("📋 Loading config from {}", default_path.display());
            return Self::load(default_path);
        }

        tracing::warn!("⚠️ No config.toml found, using defaults");
        Ok(Self::default())
    }

    /// Apply `VENUE_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("VENUE_URL") {
            self.connection.url = url;
        }
        if let Ok(username) = std::env::var("VENUE_USERNAME") {
            self.credentials.username = username;
        }
        if let Ok(password) = std::env::var("VENUE_PASSWORD") {
            self.credentials.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.url.is_empty() {
            return Err(Error::Config("connection.url is empty".into()));
        }
        if self.credentials.username.is_empty() {
            return Err(Error::Config("credentials.username is empty".into()));
        }
        if self.order.symbol.is_empty() {
            return Err(Error::Config("order.symbol is empty".into()));
        }
        if self.order.quantity <= Decimal::ZERO {
            return Err(Error::Config(format!(
                "order.quantity must be positive, got {}",
                self.order.quantity
            )));
        }
        if self.order.ord_type == OrdType::Limit && self.order.price <= Decimal::ZERO {
            return Err(Error::Config("limit order requires a positive price".into()));
        }
        if self.order.cl_ord_id == self.order.cancel_cl_ord_id {
            return Err(Error::Config(
                "order.cancel_cl_ord_id must differ from order.cl_ord_id".into(),
            ));
        }
        // logon, mass status, new order, cancel
        if self.session.first_request_id > u64::MAX - 4 {
            return Err(Error::Config(format!(
                "session.first_request_id {} leaves no room for a session's requests",
                self.session.first_request_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.session.first_request_id, 1000);
        assert_eq!(cfg.order.cl_ord_id, "test_001");
        assert!(cfg.session.request_timeout_ms.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = Config::from_toml(
            r#"
            [connection]
            url = "ws://venue:9000"

            [order]
            symbol = "ETH-PERPETUAL"
            side = "SELL"
            price = 2500.5

            [session]
            on_cancel_confirmed = "keep_alive"
            request_timeout_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.connection.url, "ws://venue:9000");
        assert_eq!(cfg.order.symbol, "ETH-PERPETUAL");
        assert_eq!(cfg.order.side, Side::Sell);
        assert_eq!(cfg.order.price, Decimal::new(25005, 1));
        assert_eq!(cfg.order.exchange, "deribit");
        assert_eq!(cfg.session.on_cancel_confirmed, CancelPolicy::KeepAlive);
        assert_eq!(cfg.session.request_timeout_ms, Some(5000));
        assert!(cfg.session.cancel_on_working);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = Config::from_toml("[order]\nside = \"SIDEWAYS\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_reused_cl_ord_id() {
        let mut cfg = Config::default();
        cfg.order.cancel_cl_ord_id = cfg.order.cl_ord_id.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_first_id_near_max() {
        let mut cfg = Config::default();
        cfg.session.first_request_id = u64::MAX;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        cfg.session.first_request_id = u64::MAX - 4;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_quantity() {
        let mut cfg = Config::default();
        cfg.order.quantity = Decimal::ZERO;
        assert!(cfg.validate().is_err());
    }
}
