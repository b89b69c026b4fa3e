//! Intent classification and cross-mode routing
//!
//! Classification is plain case-insensitive substring matching checked in
//! a fixed priority order; the first keyword found wins.

mod router;

pub use router::{Route, Router};

use serde::{Deserialize, Serialize};

/// What the user asked for, derived from a single utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OpenApplication,
    CloseApplication,
    Transcribe,
    StudyQuery,
    SearchWeb,
    Exit,
    FaqQuery,
    Converse,
}

/// Keyword table in priority order; `Converse` is the fallback
const KEYWORDS: [(&str, Intent); 7] = [
    ("open", Intent::OpenApplication),
    ("close", Intent::CloseApplication),
    ("transcribe", Intent::Transcribe),
    ("study", Intent::StudyQuery),
    ("search", Intent::SearchWeb),
    ("exit", Intent::Exit),
    ("faq", Intent::FaqQuery),
];

impl Intent {
    /// Keyword that triggers this intent, if any
    pub fn keyword(&self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find(|(_, intent)| intent == self)
            .map(|(keyword, _)| *keyword)
    }

    /// The utterance with this intent's keyword removed
    pub fn strip(&self, utterance: &str) -> String {
        match self.keyword() {
            Some(keyword) => strip_keyword(utterance, keyword),
            None => utterance.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::OpenApplication => "open_application",
            Intent::CloseApplication => "close_application",
            Intent::Transcribe => "transcribe",
            Intent::StudyQuery => "study_query",
            Intent::SearchWeb => "search_web",
            Intent::Exit => "exit",
            Intent::FaqQuery => "faq_query",
            Intent::Converse => "converse",
        };
        write!(f, "{}", name)
    }
}

/// Classify an utterance. Total and deterministic.
pub fn classify(utterance: &str) -> Intent {
    let lowered = utterance.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, intent)| *intent)
        .unwrap_or(Intent::Converse)
}

/// True when the utterance is the bare "exit" command that ends a mode
pub fn is_exit_command(utterance: &str) -> bool {
    utterance.trim().eq_ignore_ascii_case("exit")
}

/// Remove every occurrence of `keyword` and collapse whitespace
fn strip_keyword(utterance: &str, keyword: &str) -> String {
    utterance
        .to_lowercase()
        .replace(keyword, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
