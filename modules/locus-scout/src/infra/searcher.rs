use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::admission::AdmissionGate;
use crate::traits::{SearchHit, WebSearcher};

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Tavily web search adapter.
pub struct TavilySearcher {
    api_key: String,
    client: reqwest::Client,
    gate: AdmissionGate,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    include_raw_content: bool,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    raw_content: Option<String>,
}

impl TavilySearcher {
    pub fn new(api_key: String, client: reqwest::Client, gate: AdmissionGate) -> Self {
        Self {
            api_key,
            client,
            gate,
            base_url: TAVILY_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let _permit = self.gate.admit().await?;
        info!(query, max_results, "Tavily search");

        let request = TavilySearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            include_raw_content: true,
            search_depth: "advanced",
        };

        let resp = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .context("Tavily API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Tavily API error ({status}): {body}");
        }

        let data: TavilySearchResponse = resp
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        let hits: Vec<SearchHit> = data
            .results
            .into_iter()
            .map(|r| SearchHit {
                content: r
                    .raw_content
                    .filter(|raw| !raw.trim().is_empty())
                    .unwrap_or(r.content),
                url: r.url,
                title: r.title,
            })
            .collect();

        info!(query, count = hits.len(), "Tavily search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_content_is_optional() {
        let raw = r#"{"results": [
            {"url": "https://a.com", "title": "A", "content": "short", "raw_content": null},
            {"url": "https://b.com", "content": "snippet", "raw_content": "full page"}
        ]}"#;
        let resp: TavilySearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.results.len(), 2);
        assert!(resp.results[0].raw_content.is_none());
        assert_eq!(resp.results[1].title, "");
    }
}
