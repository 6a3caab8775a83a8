mod controller;
mod keys;
mod roku;
mod types;

pub use controller::{Action, Remote, RemoteEvent};
pub use keys::{KeyCategory, RemoteKey};
pub use roku::{DeviceSession, EcpOptions, parse_app_list, parse_device_info};
pub use types::{AppCatalog, AppEntry, CommandOutcome, DeviceAddress, DeviceInfo};
