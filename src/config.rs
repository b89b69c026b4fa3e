//! Configuration loading and management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// SQLite database holding FAQ entries and the interaction log
    pub database_path: PathBuf,

    /// Directory scanned for `*.aiml` conversation files
    pub aiml_dir: PathBuf,

    /// Directory scanned for study documents
    pub documents_dir: PathBuf,

    /// Directories scanned for `*.desktop` application entries
    pub application_dirs: Vec<PathBuf>,

    pub speech: SpeechConfig,

    pub web_search: WebSearchConfig,

    /// FAQ entries seeded into the database at startup
    pub faq: Vec<FaqEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// Text-to-speech settings
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// TTS program, or `console` to print instead of speaking
    pub command: String,
    /// Words per minute passed to the TTS program
    pub rate: u32,
}

/// Web search collaborator settings
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

/// Optional overrides read from `config.json` in the data directory
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileOverrides {
    speech_command: Option<String>,
    speech_rate: Option<u32>,
    search_endpoint: Option<String>,
    search_api_key: Option<String>,
    search_max_results: Option<usize>,
    aiml_dir: Option<PathBuf>,
    documents_dir: Option<PathBuf>,
    application_dirs: Option<Vec<PathBuf>>,
    faq: Vec<FaqEntry>,
}

const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

impl Config {
    /// Load configuration from defaults, `config.json`, then environment
    pub fn load() -> Result<Self> {
        let home = PathBuf::from(std::env::var("HOME").context("HOME is not set")?);
        let data_dir = match std::env::var("ORCHESTRATOR_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => home
                .join(".local")
                .join("share")
                .join("voice-orchestrator"),
        };

        let mut config = Self::with_data_dir(&home, data_dir);

        let overrides_path = config.data_dir.join("config.json");
        if overrides_path.exists() {
            let raw = std::fs::read_to_string(&overrides_path)
                .with_context(|| format!("failed to read {}", overrides_path.display()))?;
            let overrides: FileOverrides = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", overrides_path.display()))?;
            debug!(?overrides, "applying config.json overrides");
            config.apply(overrides);
        }

        if let Ok(command) = std::env::var("ORCHESTRATOR_SPEECH_COMMAND") {
            config.speech.command = command;
        }
        if let Ok(key) = std::env::var("ORCHESTRATOR_SEARCH_API_KEY") {
            config.web_search.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("ORCHESTRATOR_SEARCH_ENDPOINT") {
            config.web_search.endpoint = endpoint;
        }

        Ok(config)
    }

    fn with_data_dir(home: &Path, data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("assistant.db"),
            aiml_dir: data_dir.join("aiml"),
            documents_dir: data_dir.join("documents"),
            application_dirs: vec![
                PathBuf::from("/usr/share/applications"),
                home.join(".local").join("share").join("applications"),
            ],
            speech: SpeechConfig {
                command: "espeak".to_string(),
                rate: 140,
            },
            web_search: WebSearchConfig {
                endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
                api_key: None,
                max_results: 3,
                timeout_secs: 10,
            },
            faq: Vec::new(),
            data_dir,
        }
    }

    fn apply(&mut self, overrides: FileOverrides) {
        if let Some(command) = overrides.speech_command {
            self.speech.command = command;
        }
        if let Some(rate) = overrides.speech_rate {
            self.speech.rate = rate;
        }
        if let Some(endpoint) = overrides.search_endpoint {
            self.web_search.endpoint = endpoint;
        }
        if overrides.search_api_key.is_some() {
            self.web_search.api_key = overrides.search_api_key;
        }
        if let Some(max) = overrides.search_max_results {
            self.web_search.max_results = max;
        }
        if let Some(dir) = overrides.aiml_dir {
            self.aiml_dir = dir;
        }
        if let Some(dir) = overrides.documents_dir {
            self.documents_dir = dir;
        }
        if let Some(dirs) = overrides.application_dirs {
            self.application_dirs = dirs;
        }
        self.faq.extend(overrides.faq);
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
