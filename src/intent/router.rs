//! Cross-mode routing
//!
//! Commands whose intent belongs to the active mode are handed back to
//! the mode loop. Everything else is serviced here, in place, by the
//! matching collaborator; the active mode never changes.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{classify, Intent};
use crate::events::ModeEvent;
use crate::mode::Mode;
use crate::services::{CollaboratorError, Services};
use crate::state::ContextStore;

pub const FAQ_FALLBACK: &str = "I couldn't find an answer to your question.";
pub const SEARCH_APOLOGY: &str =
    "I couldn't retrieve the search results. Please check your connection or API key.";

/// Where a command ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Belongs to the active mode; the loop handles it
    Native(Intent),
    /// Serviced by a collaborator; the loop speaks the result, if any
    Dispatched(Option<String>),
}

pub struct Router {
    services: Arc<Services>,
    context: Arc<ContextStore>,
    events: broadcast::Sender<ModeEvent>,
}

fn apology(collaborator: &str, error: &CollaboratorError) -> String {
    warn!(?error, collaborator, "collaborator call failed");
    format!("Sorry, {} is unavailable right now.", collaborator)
}

impl Router {
    pub fn new(
        services: Arc<Services>,
        context: Arc<ContextStore>,
        events: broadcast::Sender<ModeEvent>,
    ) -> Self {
        Self {
            services,
            context,
            events,
        }
    }

    /// Decide whether `utterance` stays in `mode` or is dispatched
    pub fn route(&self, utterance: &str, mode: Mode) -> Route {
        let intent = classify(utterance);
        if mode.is_native(intent) {
            return Route::Native(intent);
        }

        debug!(%intent, %mode, "dispatching cross-mode task");
        let _ = self.events.send(ModeEvent::TaskDispatched { mode, intent });
        Route::Dispatched(self.dispatch(intent, utterance))
    }

    /// Service `intent` with its collaborator; returns text to speak
    pub fn dispatch(&self, intent: Intent, utterance: &str) -> Option<String> {
        match intent {
            Intent::OpenApplication => Some(self.open_application(utterance)),
            Intent::CloseApplication => Some(self.close_application()),
            Intent::Transcribe => self.transcribe(utterance),
            Intent::StudyQuery => match self.study(utterance) {
                Ok(answer) => answer,
                Err(e) => Some(apology("the document library", &e)),
            },
            Intent::SearchWeb => Some(self.search_web(utterance)),
            Intent::FaqQuery => Some(self.faq(utterance)),
            Intent::Converse => self.converse(utterance),
            // Only a bare "exit" ends a mode; anything else mentioning it is ignored
            Intent::Exit => None,
        }
    }

    pub fn open_application(&self, utterance: &str) -> String {
        let hint = Intent::OpenApplication.strip(utterance);
        if hint.is_empty() {
            return "Which application should I open?".to_string();
        }

        match self.services.apps.open(&hint) {
            Ok(Some(app)) => {
                let reply = format!("Opening {}.", app.name);
                self.context.set_active_application(Some(app));
                reply
            }
            Ok(None) => {
                info!(%hint, "no application matched");
                format!("I couldn't find an application called {}.", hint)
            }
            Err(e) => apology("application control", &e),
        }
    }

    pub fn close_application(&self) -> String {
        let Some(app) = self.context.take_active_application() else {
            return "No application is open.".to_string();
        };

        match self.services.apps.close(&app) {
            Ok(()) => format!("Closing {}.", app.name),
            Err(e) => {
                let reply = apology("application control", &e);
                self.context.set_active_application(Some(app));
                reply
            }
        }
    }

    /// Retype the dictated text; only failures produce speech
    pub fn transcribe(&self, utterance: &str) -> Option<String> {
        let text = Intent::Transcribe.strip(utterance);
        self.services
            .typist
            .type_text(&text)
            .err()
            .map(|e| apology("typing", &e))
    }

    /// Answer from the document library, `None` when nothing matched
    pub fn study(&self, utterance: &str) -> Result<Option<String>, CollaboratorError> {
        let answers = self.services.documents.query(utterance)?;
        let reply = match answers.as_slice() {
            [] => return Ok(None),
            [only] => only.answer.clone(),
            many => many
                .iter()
                .map(|a| format!("From {}: {}.", a.source, a.answer))
                .collect::<Vec<_>>()
                .join(" "),
        };
        Ok(Some(reply))
    }

    pub fn search_web(&self, utterance: &str) -> String {
        let query = Intent::SearchWeb.strip(utterance);
        match self.services.web.search(&query) {
            Ok(results) => self.services.web.summarize(&results),
            Err(e) => {
                warn!(?e, %query, "web search failed");
                SEARCH_APOLOGY.to_string()
            }
        }
    }

    pub fn faq(&self, utterance: &str) -> String {
        let question = Intent::FaqQuery.strip(utterance);
        if question.is_empty() {
            return FAQ_FALLBACK.to_string();
        }
        match self.services.store.get_faq(&question) {
            Ok(Some(answer)) => answer,
            Ok(None) => FAQ_FALLBACK.to_string(),
            Err(e) => apology("the FAQ", &e),
        }
    }

    pub fn converse(&self, utterance: &str) -> Option<String> {
        self.services.conversation.respond(utterance)
    }
}
