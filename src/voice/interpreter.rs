//! Maps a spoken phrase to at most one remote action.
//!
//! Resolution runs in a fixed order and the first match wins:
//!
//! 1. If the phrase contains "open", "launch" or "start", it is a launch
//!    request. An installed app whose lower-cased name occurs in the phrase
//!    wins (catalog order), then the shortcut table is tried; otherwise the
//!    phrase is unrecognized. Launch phrases never fall through to key rules.
//! 2. The keyword table is scanned in order; the first rule with a keyword
//!    contained in the phrase picks the key.
//!
//! Keywords are plain substrings, so overlaps are settled only by table order.
//! Volume and power rules sit ahead of the directional rules so that
//! "turn up the volume" means volume and not navigation. "back" resolves to
//! the Back key because that rule precedes the rewind rule, which also lists
//! "back". Play and pause share the device's single toggle key.

use serde::Serialize;

use crate::network::device_control::{AppCatalog, AppEntry, RemoteKey};

const LAUNCH_WORDS: [&str; 3] = ["open", "launch", "start"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VoiceIntent {
    SendKey(RemoteKey),
    LaunchApp { id: String, name: String },
    Unrecognized(String),
}

/// An app reachable by name even when it is missing from the device catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppShortcut {
    pub keywords: Vec<String>,
    pub app: AppEntry,
}

impl AppShortcut {
    pub fn new(keywords: &[&str], id: &str, name: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            app: AppEntry::new(id, name),
        }
    }

    fn matches(&self, phrase: &str) -> bool {
        self.keywords.iter().any(|k| phrase.contains(k.as_str()))
    }
}

/// One row of the keyword table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule {
    pub keywords: &'static [&'static str],
    pub key: RemoteKey,
}

pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["volume up", "turn up", "louder"],
        key: RemoteKey::VolumeUp,
    },
    KeywordRule {
        keywords: &["volume down", "turn down", "quieter"],
        key: RemoteKey::VolumeDown,
    },
    KeywordRule {
        keywords: &["mute"],
        key: RemoteKey::VolumeMute,
    },
    KeywordRule {
        keywords: &["power", "turn off", "shutdown"],
        key: RemoteKey::Power,
    },
    KeywordRule {
        keywords: &["up"],
        key: RemoteKey::Up,
    },
    KeywordRule {
        keywords: &["down"],
        key: RemoteKey::Down,
    },
    KeywordRule {
        keywords: &["left"],
        key: RemoteKey::Left,
    },
    KeywordRule {
        keywords: &["right"],
        key: RemoteKey::Right,
    },
    KeywordRule {
        keywords: &["select", "enter", "ok"],
        key: RemoteKey::Select,
    },
    KeywordRule {
        keywords: &["back", "return"],
        key: RemoteKey::Back,
    },
    KeywordRule {
        keywords: &["home", "menu"],
        key: RemoteKey::Home,
    },
    KeywordRule {
        keywords: &["play", "resume"],
        key: RemoteKey::Play,
    },
    KeywordRule {
        keywords: &["pause"],
        key: RemoteKey::Play,
    },
    KeywordRule {
        keywords: &["forward", "skip"],
        key: RemoteKey::Fwd,
    },
    KeywordRule {
        // "back" never reaches this rule; see the module docs
        keywords: &["rewind", "back"],
        key: RemoteKey::Rev,
    },
];

/// Well-known streaming apps and their channel ids
pub fn default_shortcuts() -> Vec<AppShortcut> {
    vec![
        AppShortcut::new(&["youtube"], "837", "YouTube"),
        AppShortcut::new(&["netflix"], "12", "Netflix"),
        AppShortcut::new(&["hulu"], "2285", "Hulu"),
        AppShortcut::new(&["prime", "amazon"], "13", "Amazon Prime Video"),
        AppShortcut::new(&["disney"], "291097", "Disney+"),
        AppShortcut::new(&["hbo"], "61322", "HBO Max"),
    ]
}

#[derive(Debug, Clone)]
pub struct VoiceInterpreter {
    shortcuts: Vec<AppShortcut>,
    rules: &'static [KeywordRule],
}

impl VoiceInterpreter {
    pub fn new(shortcuts: Vec<AppShortcut>) -> Self {
        Self {
            shortcuts,
            rules: KEYWORD_RULES,
        }
    }

    pub fn with_shortcut(mut self, shortcut: AppShortcut) -> Self {
        self.shortcuts.push(shortcut);
        self
    }

    /// Resolve a lower-cased transcript against the current app catalog
    pub fn interpret(&self, transcript: &str, catalog: &AppCatalog) -> VoiceIntent {
        if LAUNCH_WORDS.iter().any(|w| transcript.contains(w)) {
            return self.resolve_launch(transcript, catalog);
        }

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| transcript.contains(k)))
            .map(|rule| VoiceIntent::SendKey(rule.key))
            .unwrap_or_else(|| VoiceIntent::Unrecognized(transcript.to_string()))
    }

    fn resolve_launch(&self, transcript: &str, catalog: &AppCatalog) -> VoiceIntent {
        let installed = catalog.iter().find(|app| {
            let name = app.name.to_lowercase();
            !name.is_empty() && transcript.contains(&name)
        });

        installed
            .or_else(|| {
                self.shortcuts
                    .iter()
                    .find(|s| s.matches(transcript))
                    .map(|s| &s.app)
            })
            .map(|app| VoiceIntent::LaunchApp {
                id: app.id.clone(),
                name: app.name.clone(),
            })
            .unwrap_or_else(|| VoiceIntent::Unrecognized(transcript.to_string()))
    }
}

impl Default for VoiceInterpreter {
    fn default() -> Self {
        Self::new(default_shortcuts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(id: &str, name: &str) -> VoiceIntent {
        VoiceIntent::LaunchApp {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn catalog(apps: &[(&str, &str)]) -> AppCatalog {
        apps.iter().map(|(id, name)| AppEntry::new(*id, *name)).collect()
    }

    #[test]
    fn test_launch_from_catalog() {
        let interpreter = VoiceInterpreter::default();
        let apps = catalog(&[("12", "Netflix")]);

        assert_eq!(
            interpreter.interpret("please open netflix now", &apps),
            launch("12", "Netflix")
        );
    }

    #[test]
    fn test_catalog_beats_shortcut_table() {
        let interpreter = VoiceInterpreter::default();
        let apps = catalog(&[("555", "Pluto TV"), ("99", "Netflix Kids")]);

        // "netflix" is a shortcut keyword, but the installed app name matches first
        assert_eq!(
            interpreter.interpret("open netflix kids", &apps),
            launch("99", "Netflix Kids")
        );
        assert_eq!(
            interpreter.interpret("launch pluto tv instead of netflix", &apps),
            launch("555", "Pluto TV")
        );
    }

    #[test]
    fn test_catalog_order_breaks_ties() {
        let interpreter = VoiceInterpreter::default();
        let apps = catalog(&[("1", "Plex"), ("2", "Plex Live")]);

        assert_eq!(interpreter.interpret("open plex live", &apps), launch("1", "Plex"));
    }

    #[test]
    fn test_launch_falls_back_to_shortcuts() {
        let interpreter = VoiceInterpreter::default();
        let empty = AppCatalog::default();

        let cases = [
            ("launch youtube", launch("837", "YouTube")),
            ("open netflix", launch("12", "Netflix")),
            ("start hulu", launch("2285", "Hulu")),
            ("open amazon", launch("13", "Amazon Prime Video")),
            ("launch prime video", launch("13", "Amazon Prime Video")),
            ("open disney plus", launch("291097", "Disney+")),
            ("start hbo", launch("61322", "HBO Max")),
            ("open youtube and netflix", launch("837", "YouTube")),
        ];
        for (phrase, expected) in cases {
            assert_eq!(interpreter.interpret(phrase, &empty), expected, "{}", phrase);
        }
    }

    #[test]
    fn test_unknown_launch_is_unrecognized() {
        let interpreter = VoiceInterpreter::default();

        // Launch phrases never fall through to key rules
        assert_eq!(
            interpreter.interpret("open the menu", &AppCatalog::default()),
            VoiceIntent::Unrecognized("open the menu".to_string())
        );
        assert_eq!(
            interpreter.interpret("start spotify", &catalog(&[("12", "Netflix")])),
            VoiceIntent::Unrecognized("start spotify".to_string())
        );
    }

    #[test]
    fn test_keyword_table() {
        let interpreter = VoiceInterpreter::default();
        let empty = AppCatalog::default();

        let cases = [
            ("turn up the volume", RemoteKey::VolumeUp),
            ("volume up", RemoteKey::VolumeUp),
            ("louder please", RemoteKey::VolumeUp),
            ("volume down", RemoteKey::VolumeDown),
            ("a bit quieter", RemoteKey::VolumeDown),
            ("turn down the volume", RemoteKey::VolumeDown),
            ("mute it", RemoteKey::VolumeMute),
            ("power", RemoteKey::Power),
            ("turn off the tv", RemoteKey::Power),
            ("shutdown", RemoteKey::Power),
            ("go up", RemoteKey::Up),
            ("move down", RemoteKey::Down),
            ("left", RemoteKey::Left),
            ("go right", RemoteKey::Right),
            ("select", RemoteKey::Select),
            ("enter", RemoteKey::Select),
            ("ok", RemoteKey::Select),
            ("go back please", RemoteKey::Back),
            ("return", RemoteKey::Back),
            ("home", RemoteKey::Home),
            ("show the menu", RemoteKey::Home),
            ("play", RemoteKey::Play),
            ("resume", RemoteKey::Play),
            ("pause", RemoteKey::Play),
            ("fast forward", RemoteKey::Fwd),
            ("skip", RemoteKey::Fwd),
            ("rewind", RemoteKey::Rev),
        ];
        for (phrase, key) in cases {
            assert_eq!(
                interpreter.interpret(phrase, &empty),
                VoiceIntent::SendKey(key),
                "{}",
                phrase
            );
        }
    }

    #[test]
    fn test_overlapping_keywords_follow_table_order() {
        let interpreter = VoiceInterpreter::default();
        let empty = AppCatalog::default();

        // "back" is claimed by the Back rule before the rewind rule
        assert_eq!(
            interpreter.interpret("skip back", &empty),
            VoiceIntent::SendKey(RemoteKey::Back)
        );
        assert_eq!(
            interpreter.interpret("rewind back a bit", &empty),
            VoiceIntent::SendKey(RemoteKey::Back)
        );
        // "up" inside "power up" loses to the earlier power rule
        assert_eq!(
            interpreter.interpret("power up", &empty),
            VoiceIntent::SendKey(RemoteKey::Power)
        );
        // "play" is checked before "pause"
        assert_eq!(
            interpreter.interpret("pause or play", &empty),
            VoiceIntent::SendKey(RemoteKey::Play)
        );
    }

    #[test]
    fn test_unrecognized() {
        let interpreter = VoiceInterpreter::default();
        assert_eq!(
            interpreter.interpret("what's the weather", &AppCatalog::default()),
            VoiceIntent::Unrecognized("what's the weather".to_string())
        );
        assert_eq!(
            interpreter.interpret("", &AppCatalog::default()),
            VoiceIntent::Unrecognized(String::new())
        );
    }

    #[test]
    fn test_custom_shortcut() {
        let interpreter = VoiceInterpreter::new(Vec::new())
            .with_shortcut(AppShortcut::new(&["pluto"], "74519", "Pluto TV"));

        assert_eq!(
            interpreter.interpret("open pluto", &AppCatalog::default()),
            launch("74519", "Pluto TV")
        );
        assert_eq!(
            interpreter.interpret("open netflix", &AppCatalog::default()),
            VoiceIntent::Unrecognized("open netflix".to_string())
        );
    }
}
