//! Shared types for device control. Defines the device address, app catalog,
//! device info map, and the outcome of a control operation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Network host of one device (IP address or hostname)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(host: impl Into<String>) -> Result<Self, RemoteError> {
        let host = host.into();
        let trimmed = host.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) || trimmed.contains('/') {
            return Err(RemoteError::InvalidAddress(host));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DeviceAddress {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub id: String,
    pub name: String,
}

impl AppEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Snapshot of the apps installed on a device, in the order the device reported them.
///
/// A catalog is never edited after construction; a refresh builds a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppCatalog {
    entries: Vec<AppEntry>,
}

impl AppCatalog {
    pub fn new(entries: Vec<AppEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AppEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&AppEntry> {
        self.entries.iter().find(|app| app.id == id)
    }
}

impl FromIterator<AppEntry> for AppCatalog {
    fn from_iter<I: IntoIterator<Item = AppEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Metadata reported by the device, keyed by element name (e.g. `model-name`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInfo {
    fields: BTreeMap<String, String>,
}

impl DeviceInfo {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.get("model-name")
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.get("serial-number")
    }

    pub fn software_version(&self) -> Option<&str> {
        self.get("software-version")
    }

    pub fn network_type(&self) -> Option<&str> {
        self.get("network-type")
    }

    pub fn screen_size(&self) -> Option<&str> {
        self.get("screen-size")
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.get("uptime")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Uptime rendered as `{h}h {m}m {s}s`
    pub fn uptime_display(&self) -> Option<String> {
        let secs = self.uptime()?.as_secs();
        Some(format!(
            "{}h {}m {}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ))
    }
}

impl FromIterator<(String, String)> for DeviceInfo {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Result of one device operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail")]
pub enum CommandOutcome {
    Success,
    /// Device reachable but the request was rejected
    Failed,
    /// Transport or parse failure
    Error(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            CommandOutcome::Success => "Success",
            CommandOutcome::Failed => "Failed",
            CommandOutcome::Error(_) => "Error",
        }
    }
}

impl From<Result<(), RemoteError>> for CommandOutcome {
    fn from(result: Result<(), RemoteError>) -> Self {
        match result {
            Ok(()) => CommandOutcome::Success,
            Err(RemoteError::Rejected(_)) => CommandOutcome::Failed,
            Err(e) => CommandOutcome::Error(e.to_string()),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Error(detail) => write!(f, "Error: {}", detail),
            other => f.write_str(other.tag()),
        }
    }
}
