//! Web search collaborator (Bing Web Search v7 compatible API)

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{CollaboratorError, SearchResult, WebSearch};
use crate::config::WebSearchConfig;

/// Results spoken back to the user per search
const SUMMARY_RESULTS: usize = 3;

pub struct BingSearch {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    web_pages: Option<WebPages>,
}

#[derive(Debug, Deserialize)]
struct WebPages {
    value: Vec<WebPage>,
}

#[derive(Debug, Deserialize)]
struct WebPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

impl From<WebPage> for SearchResult {
    fn from(page: WebPage) -> Self {
        Self {
            title: page.name,
            url: page.url,
            snippet: page.snippet,
        }
    }
}

fn parse_response(response: SearchResponse, max_results: usize) -> Vec<SearchResult> {
    response
        .web_pages
        .map(|pages| pages.value)
        .unwrap_or_default()
        .into_iter()
        .take(max_results)
        .map(SearchResult::from)
        .collect()
}

impl BingSearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
        })
    }
}

impl WebSearch for BingSearch {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>, CollaboratorError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CollaboratorError::Unavailable("web search", "no API key configured".to_string())
        })?;

        debug!(query, "web search");
        let response: SearchResponse = self
            .client
            .get(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .query(&[("q", query), ("textFormat", "Raw")])
            .send()?
            .error_for_status()?
            .json()?;

        Ok(parse_response(response, self.max_results))
    }
}

/// Spoken summary of the first few results
pub fn summarize_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "I couldn't find any relevant information.".to_string();
    }

    results
        .iter()
        .take(SUMMARY_RESULTS)
        .enumerate()
        .map(|(idx, r)| {
            format!(
                "Result {}: {}. {} You can read more at {}. ",
                idx + 1,
                r.title,
                r.snippet,
                r.url
            )
        })
        .collect()
}
