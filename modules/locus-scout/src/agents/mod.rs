// Source agents: independent extractors behind one capability trait.
//
// The controller holds them in one ordered Vec<Arc<dyn SourceAgent>> and
// fans them out uniformly. `extract` never fails: readiness checks and
// internal errors become messages and error strings on the output.

pub mod directory;
pub mod filing;
pub mod search;
pub mod website;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use locus_common::{LocationRecord, Source};

use crate::traits::{CandidateLocation, Toolkit};

pub use directory::DirectoryAgent;
pub use filing::FilingAgent;
pub use search::SearchAgent;
pub use website::WebsiteAgent;

/// Everything an agent needs for one job.
#[derive(Clone)]
pub struct AgentRequest {
    pub company: String,
    /// Cleaned company URL, if one was supplied and usable.
    pub url: Option<String>,
    pub toolkit: Toolkit,
}

/// Whether an agent can run for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready,
    /// Nothing to do (e.g. no URL). Reported as a message only.
    NotApplicable(String),
    /// A backend it needs is unavailable. Reported as an error too.
    MissingBackend(String),
}

/// One agent's contribution to a job.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub source: Source,
    pub records: Vec<LocationRecord>,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
}

impl AgentOutput {
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            records: Vec::new(),
            messages: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// An empty contribution carrying one error.
    pub fn failed(source: Source, error: impl Into<String>) -> Self {
        let mut output = Self::empty(source);
        output.errors.push(error.into());
        output
    }
}

#[async_trait]
pub trait SourceAgent: Send + Sync {
    fn source(&self) -> Source;

    fn name(&self) -> &str {
        self.source().label()
    }

    fn readiness(&self, request: &AgentRequest) -> Readiness;

    /// The fallible extraction. Only called when `readiness` is `Ready`.
    async fn try_extract(&self, request: &AgentRequest) -> Result<Vec<LocationRecord>>;

    /// Guarded extraction. Never fails.
    async fn extract(&self, request: &AgentRequest) -> AgentOutput {
        let source = self.source();
        let name = self.name().to_string();
        let mut output = AgentOutput::empty(source);

        match self.readiness(request) {
            Readiness::Ready => {}
            Readiness::NotApplicable(reason) => {
                info!(agent = name.as_str(), reason = reason.as_str(), "Agent skipped");
                output.messages.push(format!("{name} skipped - {reason}"));
                return output;
            }
            Readiness::MissingBackend(reason) => {
                warn!(agent = name.as_str(), reason = reason.as_str(), "Agent unavailable");
                output.messages.push(format!("{name} skipped - {reason}"));
                output.errors.push(format!("{name}: {reason}"));
                return output;
            }
        }

        match self.try_extract(request).await {
            Ok(records) => {
                info!(agent = name.as_str(), count = records.len(), "Agent finished");
                output
                    .messages
                    .push(format!("{name} found {} locations", records.len()));
                output.records = records;
            }
            Err(e) => {
                warn!(agent = name.as_str(), error = %e, "Agent failed");
                output.errors.push(format!("{name} failed: {e:#}"));
            }
        }
        output
    }
}

/// The standard agent set, in registration order.
pub fn default_agents() -> Vec<Arc<dyn SourceAgent>> {
    vec![
        Arc::new(DirectoryAgent::new()),
        Arc::new(WebsiteAgent::new()),
        Arc::new(FilingAgent::new()),
        Arc::new(SearchAgent::new()),
    ]
}

/// Turn model candidates into records. Candidates without a city are
/// dropped; a missing name becomes "{company} - {city}".
pub(crate) fn records_from_candidates(
    candidates: Vec<CandidateLocation>,
    source: Source,
    company: &str,
    source_url: Option<&str>,
) -> Vec<LocationRecord> {
    candidates
        .into_iter()
        .filter_map(|c| {
            let city = c.city.filter(|v| !v.trim().is_empty())?;
            let name = c
                .name
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| format!("{company} - {city}"));

            let mut record = LocationRecord::new(source).with_name(name).with_city(city);
            record.street_address = c.street_address;
            record.state = c.state;
            record.country = c.country;
            record.postal_code = c.postal_code;
            record.phone = c.phone;
            if let Some(url) = source_url {
                record = record.with_source_url(url);
            }
            Some(record)
        })
        .collect()
}
