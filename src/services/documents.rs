//! Local document library for study mode
//!
//! Documents are `.pdf` files (text extracted once at load) or plain
//! `.txt`/`.md` files. A query is answered with the
//! sentence from each document that shares the most content words with
//! the question.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use super::{CollaboratorError, DocumentAnswer, DocumentSearch};

const MAX_ANSWERS: usize = 3;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "about", "as", "at", "be", "by", "can", "did", "do", "does", "for",
    "from", "how", "i", "in", "is", "it", "me", "my", "of", "on", "or", "study", "tell", "that",
    "the", "this", "to", "was", "what", "when", "where", "which", "who", "why", "with", "you",
];

#[derive(Debug)]
struct Document {
    source: String,
    sentences: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DocumentLibrary {
    documents: Vec<Document>,
}

fn content_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n'])
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract the text of every page; `None` when the file can't be parsed
fn extract_pdf_text(path: &Path) -> Option<String> {
    // Malformed fonts can panic inside the extractor
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path))) {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!(?path, %e, "failed to extract PDF text");
            None
        }
        Err(_) => {
            warn!(?path, "PDF extraction panicked");
            None
        }
    }
}

impl DocumentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document's text under `source`
    pub fn add(&mut self, source: &str, text: &str) {
        self.documents.push(Document {
            source: source.to_string(),
            sentences: split_sentences(text),
        });
    }

    /// Load every `.pdf`, `.txt` and `.md` file in `dir`. A missing
    /// directory yields an empty library; unreadable PDFs are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, CollaboratorError> {
        let mut library = Self::new();
        if !dir.exists() {
            warn!(?dir, "documents directory not found, study answers disabled");
            return Ok(library);
        }

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            let text = match ext.to_ascii_lowercase().as_str() {
                "pdf" => match extract_pdf_text(&path) {
                    Some(text) => text,
                    None => continue,
                },
                "txt" | "md" => std::fs::read_to_string(&path)?,
                _ => continue,
            };

            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(%source, "loading document");
            library.add(&source, &text);
        }

        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

impl DocumentSearch for DocumentLibrary {
    fn query(&self, utterance: &str) -> Result<Vec<DocumentAnswer>, CollaboratorError> {
        let terms = content_words(utterance);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, DocumentAnswer)> = self
            .documents
            .iter()
            .filter_map(|doc| {
                doc.sentences
                    .iter()
                    .map(|sentence| (content_words(sentence).intersection(&terms).count(), sentence))
                    .filter(|(score, _)| *score > 0)
                    // first sentence wins ties
                    .fold(None, |best: Option<(usize, &String)>, candidate| match best {
                        Some(b) if b.0 >= candidate.0 => Some(b),
                        _ => Some(candidate),
                    })
                    .map(|(score, sentence)| {
                        (
                            score,
                            DocumentAnswer {
                                source: doc.source.clone(),
                                answer: sentence.clone(),
                            },
                        )
                    })
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(MAX_ANSWERS)
            .map(|(_, answer)| answer)
            .collect())
    }
}
