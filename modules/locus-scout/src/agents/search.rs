use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use locus_common::{LocationRecord, Source};

use super::{records_from_candidates, AgentRequest, Readiness, SourceAgent};
use crate::infra::util::{char_prefix, truncate_to_char_boundary};
use crate::traits::ExtractionHint;

/// Query templates; `{}` is the company name.
const QUERY_PATTERNS: &[&str] = &[
    "{} office locations addresses",
    "{} headquarters contact information",
    "{} facilities locations",
];
const RESULTS_PER_QUERY: usize = 2;
const MIN_CONTENT_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 2_000;
const NAME_KEY_CHARS: usize = 20;

/// Web-search agent: targeted queries whose top results are read by the
/// language backend. Only locations whose city appears in the result
/// text are kept.
pub struct SearchAgent;

impl SearchAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SearchAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAgent for SearchAgent {
    fn source(&self) -> Source {
        Source::Search
    }

    fn readiness(&self, request: &AgentRequest) -> Readiness {
        if request.toolkit.search.is_none() {
            return Readiness::MissingBackend("Tavily API key not provided".into());
        }
        if request.toolkit.language.is_none() {
            return Readiness::MissingBackend("OpenAI API key not provided".into());
        }
        Readiness::Ready
    }

    async fn try_extract(&self, request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        let (Some(search), Some(language)) = (
            request.toolkit.search.as_ref(),
            request.toolkit.language.as_ref(),
        ) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for pattern in QUERY_PATTERNS {
            let query = pattern.replace("{}", &request.company);
            let hits = match search.search(&query, RESULTS_PER_QUERY).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = query.as_str(), error = %e, "Web search failed");
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            for hit in hits.into_iter().take(RESULTS_PER_QUERY) {
                if hit.content.chars().count() < MIN_CONTENT_CHARS {
                    debug!(url = hit.url.as_str(), "Search result too short, skipping");
                    continue;
                }
                let content = truncate_to_char_boundary(&hit.content, MAX_CONTENT_CHARS);
                let hint = ExtractionHint::new(request.company.as_str(), Source::Search)
                    .with_source_url(hit.url.as_str());

                let candidates = match language.extract_locations(content, &hint).await {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        warn!(url = hit.url.as_str(), error = %e, "Search result extraction failed");
                        continue;
                    }
                };

                let content_lower = content.to_lowercase();
                for record in
                    records_from_candidates(candidates, Source::Search, &request.company, Some(&hit.url))
                {
                    let city = record.city.as_deref().unwrap_or_default().to_lowercase();
                    if !content_lower.contains(&city) {
                        debug!(city = city.as_str(), "City not in source text, dropping");
                        continue;
                    }
                    let name = record.name.as_deref().unwrap_or_default().to_lowercase();
                    let key = (city, char_prefix(&name, NAME_KEY_CHARS).to_string());
                    if seen.insert(key) {
                        records.push(record);
                    }
                }
            }
        }

        if failures == QUERY_PATTERNS.len() {
            if let Some(e) = last_error {
                return Err(e.context("every web search failed"));
            }
        }

        Ok(records)
    }
}
