//! Web search
//!
//! Provides web search via configurable providers (Tavily, Brave, Serper)

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Results folded into the answer prompt
pub const CONTEXT_RESULTS: usize = 3;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Anything that can answer a search query
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a query, returning at most `limit` results in provider order
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;

    /// Provider name, for logging
    fn name(&self) -> &'static str;
}

/// Search provider configuration
#[derive(Debug, Clone)]
pub enum SearchProvider {
    /// Tavily Search API
    Tavily { api_key: SecretString },
    /// Brave Search API
    Brave { api_key: SecretString },
    /// Serper (Google) Search API
    Serper { api_key: SecretString },
}

impl SearchProvider {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tavily { .. } => "tavily",
            Self::Brave { .. } => "brave",
            Self::Serper { .. } => "serper",
        }
    }
}

/// HTTP web search client
pub struct WebSearch {
    provider: SearchProvider,
    client: reqwest::Client,
}

/// Search result from web search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title
    pub title: String,
    /// Result URL
    pub url: String,
    /// Result snippet/description
    pub snippet: String,
}

/// Tavily API request body
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

/// Tavily API response
#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Brave Search API response
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Serper API response
#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    organic: Option<Vec<SerperResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Serper API request body
#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

impl WebSearch {
    /// Create a search client for the given provider
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(provider: SearchProvider) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self { provider, client })
    }

    /// Search using the Tavily API
    async fn search_tavily(
        &self,
        api_key: &SecretString,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let request_body = TavilyRequest {
            query,
            search_depth: "basic",
            max_results: limit,
        };

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .bearer_auth(api_key.expose_secret())
            .json(&request_body)
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;

        let tavily_response: TavilySearchResponse = response.json().await?;

        Ok(tavily_response
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }

    /// Search using Brave Search API
    async fn search_brave(
        &self,
        api_key: &SecretString,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", api_key.expose_secret())
            .query(&[("q", query), ("count", &limit.to_string())])
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;

        let brave_response: BraveSearchResponse = response.json().await?;

        let results = brave_response
            .web
            .map(|web| {
                web.results
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.url,
                        snippet: r.description,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    /// Search using Serper API
    async fn search_serper(
        &self,
        api_key: &SecretString,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let request_body = SerperRequest { q: query, num: limit };

        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key.expose_secret())
            .json(&request_body)
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;

        let serper_response: SerperSearchResponse = response.json().await?;

        let results = serper_response
            .organic
            .map(|organic| {
                organic
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.link,
                        snippet: r.snippet,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

#[async_trait]
impl SearchBackend for WebSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        tracing::debug!(provider = self.provider.name(), query, limit, "web search");

        let mut results = match &self.provider {
            SearchProvider::Tavily { api_key } => self.search_tavily(api_key, query, limit).await,
            SearchProvider::Brave { api_key } => self.search_brave(api_key, query, limit).await,
            SearchProvider::Serper { api_key } => self.search_serper(api_key, query, limit).await,
        }?;

        results.truncate(limit);
        Ok(results)
    }

    fn name(&self) -> &'static str {
        self.provider.name()
    }
}

/// Fold the top results into one context blob for the answer prompt
///
/// Returns `None` when there is nothing to say.
#[must_use]
pub fn format_context(results: &[SearchResult]) -> Option<String> {
    let blocks: Vec<String> = results
        .iter()
        .take(CONTEXT_RESULTS)
        .map(|r| format!("Source: {}\nContent: {}", r.url, r.snippet.trim()))
        .collect();

    (!blocks.is_empty()).then(|| blocks.join("\n---\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(n: usize) -> SearchResult {
        SearchResult {
            title: format!("title {n}"),
            url: format!("https://example.com/{n}"),
            snippet: format!(" snippet {n} "),
        }
    }

    #[test]
    fn test_new_tavily() {
        let tool = WebSearch::new(SearchProvider::Tavily {
            api_key: SecretString::from("tvly-test".to_string()),
        })
        .unwrap();
        assert_eq!(tool.name(), "tavily");
    }

    #[test]
    fn test_provider_debug_hides_key() {
        let provider = SearchProvider::Brave {
            api_key: SecretString::from("super-secret".to_string()),
        };
        assert!(!format!("{provider:?}").contains("super-secret"));
    }

    #[test]
    fn test_format_context_takes_top_three() {
        let results: Vec<_> = (1..=5).map(result).collect();
        let context = format_context(&results).unwrap();

        assert_eq!(context.matches("Source: ").count(), 3);
        assert!(context.starts_with("Source: https://example.com/1\nContent: snippet 1\n---\n"));
        assert!(!context.contains("example.com/4"));
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), None);
    }

    #[test]
    fn test_tavily_response_parsing() {
        let body = r#"{"query":"q","results":[{"title":"T","url":"https://t.example","content":"C","score":0.9}]}"#;
        let parsed: TavilySearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].content, "C");
    }
}
