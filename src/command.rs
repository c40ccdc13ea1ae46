//! Voice command interpretation
//!
//! Maps recognized text to one of a closed set of intents by literal
//! substring matching. Triggers may appear anywhere inside a longer
//! utterance; the first trigger in [`TRIGGERS`] order wins.

use std::fmt;

/// Interpreted meaning of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Open the games menu
    OpenGames,
    /// Open puzzles
    OpenPuzzles,
    /// Generate and narrate a story
    TellStory,
    /// Pause the story being narrated
    Pause,
    /// Resume a paused story
    Resume,
    /// List the available commands
    Help,
    /// Say goodbye
    Goodbye,
    /// Nothing matched
    Unrecognized,
}

/// Trigger phrases in match order
pub const TRIGGERS: [(&str, Intent); 7] = [
    ("открыть игры", Intent::OpenGames),
    ("пазлы", Intent::OpenPuzzles),
    ("расскажи сказку", Intent::TellStory),
    ("пауза", Intent::Pause),
    ("продолжи", Intent::Resume),
    ("помощь", Intent::Help),
    ("пока", Intent::Goodbye),
];

/// Interpret recognized text
///
/// Pure and deterministic: the text is lower-cased and trimmed, then tested
/// against [`TRIGGERS`] in order.
#[must_use]
pub fn interpret(text: &str) -> Intent {
    let normalized = text.trim().to_lowercase();

    TRIGGERS
        .iter()
        .find(|(trigger, _)| normalized.contains(*trigger))
        .map_or(Intent::Unrecognized, |&(_, intent)| intent)
}

impl Intent {
    /// Fixed spoken reply for intents that need no text generation
    #[must_use]
    pub const fn canned_response(self) -> Option<&'static str> {
        match self {
            Self::OpenGames => Some("Открываю игры: пазлы, головоломки, викторины"),
            Self::OpenPuzzles => Some("Загружаю пазлы..."),
            Self::Goodbye => Some("Пока-пока!"),
            Self::Unrecognized => Some("Я не поняла, повтори, пожалуйста."),
            Self::TellStory | Self::Pause | Self::Resume | Self::Help => None,
        }
    }

    /// Whether this intent leaves an active story running
    #[must_use]
    pub const fn controls_story(self) -> bool {
        matches!(self, Self::Pause | Self::Resume)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenGames => "open-games",
            Self::OpenPuzzles => "open-puzzles",
            Self::TellStory => "tell-story",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Help => "help",
            Self::Goodbye => "goodbye",
            Self::Unrecognized => "unrecognized",
        })
    }
}

/// Spoken command list used when the help generator returns nothing
#[must_use]
pub fn command_list() -> String {
    let phrases: Vec<&str> = TRIGGERS.iter().map(|&(trigger, _)| trigger).collect();
    format!("Я понимаю: {}.", phrases.join(", "))
}
