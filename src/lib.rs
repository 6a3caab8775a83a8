//! Control engine for Roku streaming devices: SSDP discovery, ECP commands,
//! cached app and device metadata, and a voice command interpreter.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod network;
pub mod scanner;
pub mod voice;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, RemoteConfig};
pub use error::{RemoteError, Result};
pub use network::device_control::{
    AppCatalog, AppEntry, CommandOutcome, DeviceAddress, DeviceInfo, DeviceSession, EcpOptions,
    Remote, RemoteKey,
};
pub use scanner::SsdpScanner;
