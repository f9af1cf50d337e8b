//! Build-time configuration
//!
//! Credentials, broker and board come from `cfg.toml` at compile time and are
//! validated once at startup. See `cfg.toml.example`.

use std::time::Duration;

use thiserror::Error;

use crate::board::BoardVariant;
use crate::display::Rotation;

#[toml_cfg::toml_config]
pub struct Config {
    #[default("")]
    wifi_ssid: &'static str,
    #[default("")]
    wifi_psk: &'static str,
    #[default("mqtt://192.168.1.10:1883")]
    broker_url: &'static str,
    #[default("sonos/current_track")]
    topic: &'static str,
    #[default("nowplaying-epaper")]
    client_id_prefix: &'static str,
    #[default("devkitc")]
    board: &'static str,
    #[default(0)]
    rotation: u16,
}

const MAX_SSID_LEN: usize = 32;
const MAX_PASSWORD_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Wi-Fi SSID is empty, set wifi_ssid in cfg.toml")]
    EmptySsid,
    #[error("Wi-Fi SSID is {0} bytes, at most 32 allowed")]
    SsidTooLong(usize),
    #[error("Wi-Fi password is {0} bytes, at most 64 allowed")]
    PasswordTooLong(usize),
    #[error("broker URL {0:?} must start with mqtt:// or mqtts://")]
    BrokerUrl(String),
    #[error("MQTT topic is empty")]
    EmptyTopic,
    #[error("unknown board {0:?}, expected one of: s3, devkitc, d32")]
    UnknownBoard(String),
    #[error("panel rotation {0} is not one of 0, 90, 180, 270")]
    Rotation(u16),
}

/// How the access point authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiAuth {
    Open,
    Wpa2Personal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: String,
    pub password: String,
    pub auth: WifiAuth,
}

impl WifiNetwork {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConfigError> {
        if ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong(ssid.len()));
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooLong(password.len()));
        }

        let auth = if password.is_empty() {
            WifiAuth::Open
        } else {
            WifiAuth::Wpa2Personal
        };

        Ok(Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
            auth,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub url: String,
    pub topic: String,
    pub client_id_prefix: String,
}

impl BrokerConfig {
    pub fn new(url: &str, topic: &str, client_id_prefix: &str) -> Result<Self, ConfigError> {
        if !(url.starts_with("mqtt://") || url.starts_with("mqtts://")) {
            return Err(ConfigError::BrokerUrl(url.to_string()));
        }
        if topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        Ok(Self {
            url: url.to_string(),
            topic: topic.to_string(),
            client_id_prefix: client_id_prefix.to_string(),
        })
    }

    /// `<prefix>-<station MAC in hex>`
    pub fn client_id(&self, mac: [u8; 6]) -> String {
        let suffix: String = mac.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}-{}", self.client_id_prefix, suffix)
    }

    /// Topic the keep-alive is published on
    pub fn status_topic(&self, client_id: &str) -> String {
        format!("{}/{}/status", self.topic, client_id)
    }
}

/// Fixed timing of the bring-up and session retry loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How long one association attempt may take
    pub association_timeout: Duration,
    /// Pause before every association attempt, the first one included
    pub association_retry_delay: Duration,
    /// Pause between association and the first address poll
    pub address_settle_delay: Duration,
    /// Pause between address polls while DHCP is pending
    pub address_poll_interval: Duration,
    /// Pause after a broker connect or subscribe failure
    pub broker_backoff: Duration,
    /// Keep-alive period of the liveness loop
    pub keep_alive_interval: Duration,
    /// How long to wait for the broker to acknowledge connect/subscribe
    pub broker_timeout: Duration,
    /// Consecutive keep-alive failures before the session counts as lost
    pub max_keep_alive_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            association_timeout: Duration::from_secs(10),
            association_retry_delay: Duration::from_secs(2),
            address_settle_delay: Duration::from_secs(2),
            address_poll_interval: Duration::from_secs(1),
            broker_backoff: Duration::from_secs(5),
            keep_alive_interval: Duration::from_secs(30),
            broker_timeout: Duration::from_secs(10),
            max_keep_alive_failures: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub wifi: WifiNetwork,
    pub broker: BrokerConfig,
    pub retry: RetryPolicy,
    pub board: BoardVariant,
    pub rotation: Rotation,
}

impl DeviceConfig {
    /// Resolve the values compiled in from `cfg.toml`
    pub fn from_build_config() -> Result<Self, ConfigError> {
        Ok(Self {
            wifi: WifiNetwork::new(CONFIG.wifi_ssid, CONFIG.wifi_psk)?,
            broker: BrokerConfig::new(CONFIG.broker_url, CONFIG.topic, CONFIG.client_id_prefix)?,
            retry: RetryPolicy::default(),
            board: CONFIG.board.parse()?,
            rotation: Rotation::from_degrees(CONFIG.rotation)?,
        })
    }
}
