use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use locus_common::{LocationRecord, Source};

use super::{records_from_candidates, AgentRequest, Readiness, SourceAgent};
use crate::infra::util::truncate_to_char_boundary;
use crate::traits::ExtractionHint;

const EDGAR_SEARCH_URL: &str = "https://www.sec.gov/cgi-bin/browse-edgar";
const MIN_FEED_CHARS: usize = 100;
const MAX_FEED_CHARS: usize = 5_000;
const DEFAULT_COUNTRY: &str = "USA";

/// Regulatory-filing agent: reads the EDGAR company search feed, whose
/// entries carry business and mailing addresses.
pub struct FilingAgent;

impl FilingAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FilingAgent {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn edgar_search_url(company: &str) -> Result<String> {
    let url = url::Url::parse_with_params(
        EDGAR_SEARCH_URL,
        &[
            ("action", "getcompany"),
            ("company", company),
            ("output", "atom"),
            ("count", "5"),
        ],
    )
    .context("Failed to build EDGAR search URL")?;
    Ok(url.to_string())
}

#[async_trait]
impl SourceAgent for FilingAgent {
    fn source(&self) -> Source {
        Source::SecFiling
    }

    fn readiness(&self, request: &AgentRequest) -> Readiness {
        if request.toolkit.language.is_none() {
            return Readiness::MissingBackend("OpenAI API key not provided".into());
        }
        Readiness::Ready
    }

    async fn try_extract(&self, request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        let Some(language) = request.toolkit.language.as_ref() else {
            return Ok(Vec::new());
        };

        let url = edgar_search_url(&request.company)?;
        let page = request.toolkit.fetcher.fetch(&url).await?;

        if !page.body.contains("entry") || page.body.len() <= MIN_FEED_CHARS {
            info!(company = request.company.as_str(), "No EDGAR filings found");
            return Ok(Vec::new());
        }

        let hint = ExtractionHint::new(request.company.as_str(), Source::SecFiling)
            .with_source_url(url.as_str());
        let feed = truncate_to_char_boundary(&page.body, MAX_FEED_CHARS);
        let candidates = language.extract_locations(feed, &hint).await?;

        let mut records =
            records_from_candidates(candidates, Source::SecFiling, &request.company, Some(&url));
        for record in &mut records {
            if record.country.is_none() {
                record.country = Some(DEFAULT_COUNTRY.to_string());
            }
        }
        Ok(records)
    }
}
