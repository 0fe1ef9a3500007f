use std::time::Duration;

use dpx_core::Identity;
use dpx_peer::{LocalNode, Peer};
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Identity of the local Diameter node.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NodeSettings {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(length(min = 1))]
    pub realm: String,
}

impl NodeSettings {
    pub fn into_node(self) -> Result<LocalNode, ConfigError> {
        let host = Identity::new(self.host)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        let realm = Identity::new(self.realm)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(LocalNode::new(host, realm))
    }
}

/// Per-peer connection settings. Timer fields are in seconds.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PeerSettings {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(length(min = 1))]
    pub realm: String,

    #[serde(default = "default_watchdog_interval")]
    #[validate(range(min = 1))]
    pub watchdog_interval: u64,

    #[serde(default = "default_watchdog_expired")]
    #[validate(range(min = 1))]
    pub watchdog_expired: u32,

    #[serde(default = "default_send_timeout")]
    #[validate(range(min = 1))]
    pub send_timeout: u64,

    #[serde(default = "default_transport_timeout")]
    #[validate(range(min = 1))]
    pub transport_timeout: u64,
}

fn default_watchdog_interval() -> u64 {
    30
}

fn default_watchdog_expired() -> u32 {
    3
}

fn default_send_timeout() -> u64 {
    10
}

fn default_transport_timeout() -> u64 {
    3
}

impl PeerSettings {
    pub fn into_peer(self) -> Result<Peer, ConfigError> {
        let host = Identity::new(self.host)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        let realm = Identity::new(self.realm)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        let mut peer = Peer::new(host, realm);
        peer.wd_interval = Duration::from_secs(self.watchdog_interval);
        peer.wd_expired = self.watchdog_expired;
        peer.snd_timeout = Duration::from_secs(self.send_timeout);
        peer.transport_timeout = Duration::from_secs(self.transport_timeout);
        Ok(peer)
    }
}

/// Load configuration from file
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("DPX"))
        .build()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Load configuration from YAML string (for testing)
pub fn load_from_yaml<T>(yaml: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::LoadError(e.to_string()))?;
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}
