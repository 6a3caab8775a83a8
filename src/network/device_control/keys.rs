//! ECP key vocabulary emitted by the remote and the voice interpreter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteKey {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Home,
    /// Play and pause share one toggle key on the device
    Play,
    Rev,
    Fwd,
    InstantReplay,
    Info,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyCategory {
    Navigation,
    Playback,
    Volume,
    Power,
    Other,
}

impl RemoteKey {
    pub const ALL: [RemoteKey; 16] = [
        RemoteKey::Up,
        RemoteKey::Down,
        RemoteKey::Left,
        RemoteKey::Right,
        RemoteKey::Select,
        RemoteKey::Back,
        RemoteKey::Home,
        RemoteKey::Play,
        RemoteKey::Rev,
        RemoteKey::Fwd,
        RemoteKey::InstantReplay,
        RemoteKey::Info,
        RemoteKey::VolumeUp,
        RemoteKey::VolumeDown,
        RemoteKey::VolumeMute,
        RemoteKey::Power,
    ];

    /// Name used in the `/keypress/{key}` path
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKey::Up => "Up",
            RemoteKey::Down => "Down",
            RemoteKey::Left => "Left",
            RemoteKey::Right => "Right",
            RemoteKey::Select => "Select",
            RemoteKey::Back => "Back",
            RemoteKey::Home => "Home",
            RemoteKey::Play => "Play",
            RemoteKey::Rev => "Rev",
            RemoteKey::Fwd => "Fwd",
            RemoteKey::InstantReplay => "InstantReplay",
            RemoteKey::Info => "Info",
            RemoteKey::VolumeUp => "VolumeUp",
            RemoteKey::VolumeDown => "VolumeDown",
            RemoteKey::VolumeMute => "VolumeMute",
            RemoteKey::Power => "Power",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RemoteKey::Select => "OK",
            RemoteKey::Play => "Play/Pause",
            RemoteKey::Rev => "Rewind",
            RemoteKey::Fwd => "Fast Forward",
            RemoteKey::InstantReplay => "Replay",
            RemoteKey::VolumeUp => "Volume Up",
            RemoteKey::VolumeDown => "Volume Down",
            RemoteKey::VolumeMute => "Mute",
            other => other.as_str(),
        }
    }

    pub fn category(&self) -> KeyCategory {
        match self {
            RemoteKey::Up
            | RemoteKey::Down
            | RemoteKey::Left
            | RemoteKey::Right
            | RemoteKey::Select
            | RemoteKey::Back
            | RemoteKey::Home => KeyCategory::Navigation,
            RemoteKey::Play | RemoteKey::Rev | RemoteKey::Fwd | RemoteKey::InstantReplay => {
                KeyCategory::Playback
            }
            RemoteKey::VolumeUp | RemoteKey::VolumeDown | RemoteKey::VolumeMute => {
                KeyCategory::Volume
            }
            RemoteKey::Power => KeyCategory::Power,
            RemoteKey::Info => KeyCategory::Other,
        }
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RemoteKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown key: {}", s))
    }
}
