//! AIML-backed conversation engine
//!
//! Supports the subset of AIML that hand-written chat files use in
//! practice: `<pattern>` with `*`/`_` wildcards, `<template>` text,
//! `<star/>` substitution and `<srai>` redirection.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::{CollaboratorError, ConversationEngine};

const MAX_SRAI_DEPTH: usize = 5;

#[derive(Debug, Clone)]
struct Category {
    pattern: Vec<String>,
    template: String,
}

impl Category {
    /// Literal words outrank wildcards
    fn specificity(&self) -> usize {
        self.pattern.iter().filter(|w| !is_wildcard(w)).count()
    }
}

#[derive(Debug, Default)]
pub struct AimlEngine {
    categories: Vec<Category>,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex is valid"))
}

fn category_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?s)<category>\s*<pattern>(.*?)</pattern>.*?<template>(.*?)</template>\s*</category>",
    )
}

fn star_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<star\s*/>")
}

fn srai_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<srai>(.*?)</srai>")
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<[^>]+>")
}

fn is_wildcard(word: &str) -> bool {
    word == "*" || word == "_"
}

/// Uppercase words with punctuation removed, as AIML normalizes input
fn normalize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '*' || *c == '_' || *c == '\'')
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Match `pattern` against `input`; returns the wildcard captures
fn match_words(pattern: &[String], input: &[String]) -> Option<Vec<String>> {
    match pattern.split_first() {
        None => input.is_empty().then(Vec::new),
        Some((head, rest)) if is_wildcard(head) => {
            // Wildcards consume one or more words, shortest first
            for take in 1..=input.len() {
                if let Some(mut stars) = match_words(rest, &input[take..]) {
                    stars.insert(0, input[..take].join(" "));
                    return Some(stars);
                }
            }
            None
        }
        Some((head, rest)) => match input.split_first() {
            Some((word, remaining)) if word == head => match_words(rest, remaining),
            _ => None,
        },
    }
}

impl AimlEngine {
    /// Parse categories from AIML source text
    pub fn parse(source: &str) -> Self {
        let mut categories: Vec<Category> = category_re()
            .captures_iter(source)
            .map(|caps| Category {
                pattern: normalize(&caps[1]),
                template: caps[2].trim().to_string(),
            })
            .filter(|c| !c.pattern.is_empty())
            .collect();

        categories.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        Self { categories }
    }

    /// Load every `*.aiml` file in `dir`; a missing directory yields an empty engine
    pub fn load_dir(dir: &Path) -> Result<Self, CollaboratorError> {
        if !dir.exists() {
            warn!(?dir, "AIML directory not found, conversation replies disabled");
            return Ok(Self::default());
        }

        let mut source = String::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "aiml") {
                debug!(?path, "learning AIML file");
                source.push_str(&std::fs::read_to_string(&path)?);
                source.push('\n');
            }
        }

        Ok(Self::parse(&source))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    fn respond_at_depth(&self, utterance: &str, depth: usize) -> Option<String> {
        if depth > MAX_SRAI_DEPTH {
            return None;
        }

        let input = normalize(utterance);
        let (category, stars) = self
            .categories
            .iter()
            .find_map(|c| match_words(&c.pattern, &input).map(|stars| (c, stars)))?;

        let star = stars.first().map(|s| s.to_lowercase()).unwrap_or_default();
        let template = star_re().replace_all(&category.template, star.as_str());

        let mut failed = false;
        let expanded = srai_re().replace_all(&template, |caps: &regex::Captures<'_>| {
            match self.respond_at_depth(&caps[1], depth + 1) {
                Some(reply) => reply,
                None => {
                    failed = true;
                    String::new()
                }
            }
        });
        if failed {
            return None;
        }

        let text = tag_re()
            .replace_all(&expanded, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        (!text.is_empty()).then_some(text)
    }
}

impl ConversationEngine for AimlEngine {
    fn respond(&self, utterance: &str) -> Option<String> {
        self.respond_at_depth(utterance, 0)
    }
}
