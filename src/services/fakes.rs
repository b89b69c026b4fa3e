//! Test doubles for collaborators

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{
    AppHandle, ApplicationControl, CollaboratorError, CommandSource, ConversationEngine,
    DocumentAnswer, DocumentSearch, Persistence, SearchResult, Services, SpeechOutput, Typist,
    Voice, WebSearch,
};
use crate::mode::CancelToken;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Yields scripted utterances, then reports `Closed`
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<String>>,
    /// Run after the utterance for a given call number has been captured
    hooks: Mutex<Vec<(usize, Hook)>>,
    calls: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            script: Mutex::new(lines.iter().map(|l| l.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Run `hook` while call number `call` (1-based) is still in flight
    pub fn on_call(&self, call: usize, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().unwrap().push((call, Box::new(hook)));
    }

    /// Simulate a cancellation landing while call number `call` is blocked
    pub fn cancel_during(&self, call: usize, token: CancelToken) {
        self.on_call(call, move || token.cancel());
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl CommandSource for ScriptedSource {
    fn listen(&self) -> Result<String, CollaboratorError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        let utterance = self.script.lock().unwrap().pop_front();
        for (_, hook) in self.hooks.lock().unwrap().iter().filter(|(at, _)| *at == call) {
            hook();
        }
        utterance.ok_or(CollaboratorError::Closed)
    }

    fn stop(&self) {
        self.script.lock().unwrap().clear();
    }
}

#[derive(Clone, Default)]
pub struct RecordingSpeech {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechOutput for RecordingSpeech {
    fn speak(&self, text: &str) -> Result<(), CollaboratorError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct EchoEngine;

impl ConversationEngine for EchoEngine {
    fn respond(&self, utterance: &str) -> Option<String> {
        if utterance == "crash" {
            panic!("engine crashed");
        }
        (utterance != "gibberish").then(|| format!("You said {}.", utterance))
    }
}

#[derive(Default)]
pub struct FakeDocuments {
    pub answers: Vec<DocumentAnswer>,
}

impl DocumentSearch for FakeDocuments {
    fn query(&self, _utterance: &str) -> Result<Vec<DocumentAnswer>, CollaboratorError> {
        Ok(self.answers.clone())
    }
}

#[derive(Default)]
pub struct FakeWeb {
    pub results: Option<Vec<SearchResult>>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl WebSearch for FakeWeb {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>, CollaboratorError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.results.clone().ok_or_else(|| {
            CollaboratorError::Unavailable("web search", "offline".to_string())
        })
    }
}

#[derive(Clone, Default)]
pub struct FakeApps {
    pub installed: Vec<String>,
    pub opened: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<Vec<AppHandle>>>,
}

impl ApplicationControl for FakeApps {
    fn open(&self, name_hint: &str) -> Result<Option<AppHandle>, CollaboratorError> {
        self.opened.lock().unwrap().push(name_hint.to_string());
        Ok(self
            .installed
            .iter()
            .find(|name| name.eq_ignore_ascii_case(name_hint))
            .map(|name| AppHandle {
                name: name.to_lowercase(),
                exec: format!("/usr/bin/{}", name.to_lowercase()),
            }))
    }

    fn close(&self, app: &AppHandle) -> Result<(), CollaboratorError> {
        self.closed.lock().unwrap().push(app.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeTypist {
    pub typed: Arc<Mutex<Vec<String>>>,
}

impl Typist for FakeTypist {
    fn type_text(&self, text: &str) -> Result<(), CollaboratorError> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeStore {
    pub faq: HashMap<String, String>,
    pub questions: Arc<Mutex<Vec<String>>>,
    pub log: Arc<Mutex<Vec<(String, String)>>>,
}

impl Persistence for FakeStore {
    fn get_faq(&self, question: &str) -> Result<Option<String>, CollaboratorError> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(self.faq.get(question).cloned())
    }

    fn log_interaction(&self, command: &str, response: &str) -> Result<(), CollaboratorError> {
        self.log
            .lock()
            .unwrap()
            .push((command.to_string(), response.to_string()));
        Ok(())
    }
}

/// Handles onto the doubles wired into a [`Services`] bundle
pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub speech: RecordingSpeech,
    pub apps: FakeApps,
    pub typist: FakeTypist,
    pub store: FakeStore,
    pub web_queries: Arc<Mutex<Vec<String>>>,
}

/// Builder for a fully faked [`Services`]
#[derive(Default)]
pub struct ServicesBuilder {
    pub script: Vec<String>,
    pub installed_apps: Vec<String>,
    pub faq: HashMap<String, String>,
    pub documents: Vec<DocumentAnswer>,
    pub web_results: Option<Vec<SearchResult>>,
}

impl ServicesBuilder {
    pub fn script(lines: &[&str]) -> Self {
        Self {
            script: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn build(self) -> (Arc<Services>, Harness) {
        let lines: Vec<&str> = self.script.iter().map(String::as_str).collect();
        let source = Arc::new(ScriptedSource::new(&lines));
        let speech = RecordingSpeech::default();
        let apps = FakeApps {
            installed: self.installed_apps,
            ..FakeApps::default()
        };
        let typist = FakeTypist::default();
        let store = FakeStore {
            faq: self.faq,
            ..FakeStore::default()
        };
        let web = FakeWeb {
            results: self.web_results,
            ..FakeWeb::default()
        };
        let web_queries = Arc::clone(&web.queries);

        let services = Services {
            commands: source.clone(),
            voice: Voice::new(Box::new(speech.clone())),
            conversation: Box::new(EchoEngine),
            documents: Box::new(FakeDocuments {
                answers: self.documents,
            }),
            web: Box::new(web),
            apps: Box::new(apps.clone()),
            typist: Box::new(typist.clone()),
            store: Box::new(store.clone()),
        };

        (
            Arc::new(services),
            Harness {
                source,
                speech,
                apps,
                typist,
                store,
                web_queries,
            },
        )
    }
}
