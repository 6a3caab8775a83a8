pub mod interpreter;
pub mod listener;

pub use interpreter::{
    AppShortcut, KEYWORD_RULES, KeywordRule, VoiceIntent, VoiceInterpreter, default_shortcuts,
};
pub use listener::{PhraseSource, StdinPhrases, TranscriptionError, VoiceListener};
