//! Configuration types for settlement nodes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ObligationError, Result, constants};

/// Configuration for a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name, used in logs.
    pub name: String,
    /// Protocol timeouts.
    #[serde(default)]
    pub flow: FlowConfig,
    /// Vault sizing.
    #[serde(default)]
    pub vault: VaultConfig,
    /// Capacity of the inbound message queue.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_inbox_capacity() -> usize {
    constants::DEFAULT_INBOX_CAPACITY
}

impl NodeConfig {
    /// Default configuration for a node called `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flow: FlowConfig::default(),
            vault: VaultConfig::default(),
            inbox_capacity: constants::DEFAULT_INBOX_CAPACITY,
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ObligationError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ObligationError::Configuration("node name is empty".into()));
        }
        if self.inbox_capacity == 0 {
            return Err(ObligationError::Configuration(
                "inbox_capacity must be > 0".into(),
            ));
        }
        self.flow.validate()?;
        self.vault.validate()
    }
}

/// Timeouts for the suspend points of a protocol run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// How long to wait for a counterparty signature.
    pub counterparty_timeout_ms: u64,
    /// How long to wait for the notary.
    pub notary_timeout_ms: u64,
    /// How long to wait for a participant to acknowledge finality.
    pub finality_ack_timeout_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            counterparty_timeout_ms: constants::DEFAULT_COUNTERPARTY_TIMEOUT_MS,
            notary_timeout_ms: constants::DEFAULT_NOTARY_TIMEOUT_MS,
            finality_ack_timeout_ms: constants::DEFAULT_FINALITY_ACK_TIMEOUT_MS,
        }
    }
}

impl FlowConfig {
    #[must_use]
    pub fn counterparty_timeout(&self) -> Duration {
        Duration::from_millis(self.counterparty_timeout_ms)
    }

    #[must_use]
    pub fn notary_timeout(&self) -> Duration {
        Duration::from_millis(self.notary_timeout_ms)
    }

    #[must_use]
    pub fn finality_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_ack_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.counterparty_timeout_ms == 0
            || self.notary_timeout_ms == 0
            || self.finality_ack_timeout_ms == 0
        {
            return Err(ObligationError::Configuration(
                "flow timeouts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Vault sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Number of recorded transition ids remembered for idempotency.
    pub idempotency_cache_size: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            idempotency_cache_size: constants::DEFAULT_IDEMPOTENCY_CACHE_SIZE,
        }
    }
}

impl VaultConfig {
    fn validate(&self) -> Result<()> {
        if self.idempotency_cache_size == 0 {
            return Err(ObligationError::Configuration(
                "idempotency_cache_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_config_defaults() {
        let cfg = FlowConfig::default();
        assert_eq!(cfg.counterparty_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.notary_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.finality_ack_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn named_config_is_valid() {
        assert!(NodeConfig::named("PartyA").validate().is_ok());
    }

    #[test]
    fn from_json_fills_defaults() {
        let cfg = NodeConfig::from_json(r#"{ "name": "PartyB" }"#).unwrap();
        assert_eq!(cfg.name, "PartyB");
        assert_eq!(
            cfg.vault.idempotency_cache_size,
            constants::DEFAULT_IDEMPOTENCY_CACHE_SIZE
        );
        assert_eq!(cfg.inbox_capacity, constants::DEFAULT_INBOX_CAPACITY);
    }

    #[test]
    fn from_json_overrides_timeouts() {
        let cfg = NodeConfig::from_json(
            r#"{
                "name": "PartyC",
                "flow": {
                    "counterparty_timeout_ms": 100,
                    "notary_timeout_ms": 200,
                    "finality_ack_timeout_ms": 300
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.flow.counterparty_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.flow.notary_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut cfg = NodeConfig::named("PartyA");
        cfg.flow.notary_timeout_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ObligationError::Configuration(_)));
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        let err = NodeConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ObligationError::Configuration(_)));
    }

    #[test]
    fn empty_name_rejected() {
        assert!(NodeConfig::named("  ").validate().is_err());
    }
}
