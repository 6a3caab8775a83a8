//! Runtime configuration loaded from the environment.
//!
//! * `ROKU_HOST`: device address; discovery runs when unset
//! * `ROKU_PORT`: ECP port, defaults to 8060
//! * `ROKU_REQUEST_TIMEOUT_SECS`: per-request timeout, defaults to 3
//! * `ROKU_DISCOVERY_TIMEOUT_SECS`: SSDP listen window, defaults to 5
//! * `ROKU_VOICE_STOP_GRACE_MS`: how long stopping the listener may wait, defaults to 1000

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::network::device_control::EcpOptions;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub host: Option<String>,
    pub port: u16,
    pub request_timeout: Duration,
    pub discovery_timeout: Duration,
    pub voice_stop_grace: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: EcpOptions::PORT,
            request_timeout: EcpOptions::TIMEOUT,
            discovery_timeout: Duration::from_secs(5),
            voice_stop_grace: Duration::from_millis(1000),
        }
    }
}

impl RemoteConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any name → value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("ROKU_HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        let port = parse_var(&lookup, "ROKU_PORT")?.unwrap_or(defaults.port);
        let request_timeout = parse_var(&lookup, "ROKU_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let discovery_timeout = parse_var(&lookup, "ROKU_DISCOVERY_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.discovery_timeout);
        let voice_stop_grace = parse_var(&lookup, "ROKU_VOICE_STOP_GRACE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.voice_stop_grace);

        Ok(Self {
            host,
            port,
            request_timeout,
            discovery_timeout,
            voice_stop_grace,
        })
    }

    pub fn ecp_options(&self) -> EcpOptions {
        EcpOptions {
            port: self.port,
            timeout: self.request_timeout,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}
