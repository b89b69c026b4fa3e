//! External collaborators the orchestrator calls into
//!
//! Each collaborator sits behind a small blocking trait so mode loops can
//! run against real adapters or test doubles alike.

mod apps;
mod command;
mod conversation;
mod documents;
mod speech;
mod store;
mod typist;
mod web;

#[cfg(test)]
pub mod fakes;

pub use apps::DesktopApps;
pub use command::StdinCommandSource;
pub use conversation::AimlEngine;
pub use documents::DocumentLibrary;
pub use speech::{ConsoleSpeech, ProcessSpeech, Voice};
pub use store::SqliteStore;
pub use typist::XdotoolTypist;
pub use web::{summarize_results, BingSearch};

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Config, FaqEntry};

/// Errors reported by collaborators
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The command source has no more input and never will
    #[error("command source closed")]
    Closed,

    #[error("{0} unavailable: {1}")]
    Unavailable(&'static str, String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Opaque handle to an application launched by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppHandle {
    /// Lowercased display name the handle resolved to
    pub name: String,
    /// Program that was launched
    pub exec: String,
}

/// One answer from the document library
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnswer {
    pub source: String,
    pub answer: String,
}

/// One web search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Blocking recognizer: yields one utterance per call
pub trait CommandSource: Send + Sync {
    fn listen(&self) -> Result<String, CollaboratorError>;

    /// Release capture resources; later `listen` calls return `Closed`
    fn stop(&self) {}
}

/// Blocking text-to-speech
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), CollaboratorError>;
}

pub trait ConversationEngine: Send + Sync {
    fn respond(&self, utterance: &str) -> Option<String>;
}

pub trait DocumentSearch: Send + Sync {
    fn query(&self, utterance: &str) -> Result<Vec<DocumentAnswer>, CollaboratorError>;
}

pub trait WebSearch: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>, CollaboratorError>;

    fn summarize(&self, results: &[SearchResult]) -> String {
        summarize_results(results)
    }
}

pub trait ApplicationControl: Send + Sync {
    /// Launch the installed application closest to `name_hint`
    fn open(&self, name_hint: &str) -> Result<Option<AppHandle>, CollaboratorError>;

    fn close(&self, app: &AppHandle) -> Result<(), CollaboratorError>;
}

/// Host automation used by transcription mode
pub trait Typist: Send + Sync {
    fn type_text(&self, text: &str) -> Result<(), CollaboratorError>;
}

pub trait Persistence: Send + Sync {
    fn get_faq(&self, question: &str) -> Result<Option<String>, CollaboratorError>;

    fn log_interaction(&self, command: &str, response: &str) -> Result<(), CollaboratorError>;
}

/// Every collaborator a mode loop may need, shared across workers
pub struct Services {
    pub commands: Arc<dyn CommandSource>,
    pub voice: Voice,
    pub conversation: Box<dyn ConversationEngine>,
    pub documents: Box<dyn DocumentSearch>,
    pub web: Box<dyn WebSearch>,
    pub apps: Box<dyn ApplicationControl>,
    pub typist: Box<dyn Typist>,
    pub store: Box<dyn Persistence>,
}

impl Services {
    /// Build the production adapters described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let speech: Box<dyn SpeechOutput> = if config.speech.command == "console" {
            Box::new(ConsoleSpeech)
        } else {
            Box::new(ProcessSpeech::new(&config.speech.command, config.speech.rate))
        };

        let conversation = AimlEngine::load_dir(&config.aiml_dir)
            .with_context(|| format!("failed to load AIML from {}", config.aiml_dir.display()))?;
        let documents = DocumentLibrary::load_dir(&config.documents_dir).with_context(|| {
            format!(
                "failed to load documents from {}",
                config.documents_dir.display()
            )
        })?;
        let store = SqliteStore::open(&config.database_path).with_context(|| {
            format!("failed to open {}", config.database_path.display())
        })?;
        let seeded = seed_faq(&store, &config.faq)?;
        let web = BingSearch::new(&config.web_search)?;

        info!(
            categories = conversation.len(),
            documents = documents.len(),
            faq_seeded = seeded,
            "collaborators ready"
        );

        Ok(Self {
            commands: Arc::new(StdinCommandSource::new()),
            voice: Voice::new(speech),
            conversation: Box::new(conversation),
            documents: Box::new(documents),
            web: Box::new(web),
            apps: Box::new(DesktopApps::new(config.application_dirs.clone())),
            typist: Box::new(XdotoolTypist),
            store: Box::new(store),
        })
    }
}

/// Store configured FAQ entries, skipping questions already present.
/// Returns how many were added.
fn seed_faq(store: &SqliteStore, entries: &[FaqEntry]) -> Result<usize> {
    let mut added = 0;
    for entry in entries {
        if store
            .add_faq(entry.question.trim(), entry.answer.trim())
            .with_context(|| format!("failed to seed FAQ entry {:?}", entry.question))?
        {
            added += 1;
        }
    }
    Ok(added)
}
