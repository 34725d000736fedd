// Trait abstractions for the external backends the agents and the
// deduplicator depend on.
//
// PlaceSearch, LocationExtractor, TextEmbedder, PageFetcher and WebSearcher
// each wrap one upstream service. Live adapters live in `infra`, mocks in
// `testing`, so the whole pipeline runs in tests with no network.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use locus_common::{Credentials, Source};

// ---------------------------------------------------------------------------
// PlaceSearch
// ---------------------------------------------------------------------------

/// One place-search hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceHit {
    pub place_id: Option<String>,
    pub name: String,
    pub formatted_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Contact details from a per-place lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceContact {
    pub phone: Option<String>,
    pub website: Option<String>,
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<PlaceHit>>;
    async fn details(&self, place_id: &str) -> Result<PlaceContact>;
}

// ---------------------------------------------------------------------------
// LocationExtractor
// ---------------------------------------------------------------------------

/// Context handed to the language backend alongside the text.
#[derive(Debug, Clone)]
pub struct ExtractionHint {
    pub company: String,
    pub source: Source,
    pub source_url: Option<String>,
}

impl ExtractionHint {
    pub fn new(company: impl Into<String>, source: Source) -> Self {
        Self {
            company: company.into(),
            source,
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// What the model returns for each location it finds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateLocation {
    /// Office or facility name, e.g. "Acme Corp - Chicago Office"
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub name: Option<String>,
    /// Street line only, e.g. "123 Main St, Suite 400"
    #[serde(default, alias = "address", alias = "street", deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub street_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub city: Option<String>,
    /// State, province or region
    #[serde(default, alias = "province", alias = "region", deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub country: Option<String>,
    #[serde(default, alias = "zip", alias = "zip_code", deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "Option<String>")]
    pub phone: Option<String>,
}

/// The full extraction response from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CandidateList {
    #[serde(default)]
    pub locations: Vec<CandidateLocation>,
}

/// Models emit postal codes as numbers and blanks as "" or "N/A".
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let text = match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Ok(None),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || matches!(trimmed.to_lowercase().as_str(), "n/a" | "null" | "none") {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[async_trait]
pub trait LocationExtractor: Send + Sync {
    /// Malformed model output is zero candidates, not an error.
    async fn extract_locations(
        &self,
        text: &str,
        hint: &ExtractionHint,
    ) -> Result<Vec<CandidateLocation>>;
}

// ---------------------------------------------------------------------------
// TextEmbedder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// A fetched document: the raw body plus its readable text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
    /// Markdown rendering for HTML, the body itself otherwise.
    pub text: String,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            url: url.into(),
            text: body.clone(),
            body,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Plain GET. Non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Toolkit
// ---------------------------------------------------------------------------

/// The backends available to one job. Credentialed backends are `None`
/// when no key was supplied; the fetcher needs none.
#[derive(Clone)]
pub struct Toolkit {
    pub places: Option<Arc<dyn PlaceSearch>>,
    pub language: Option<Arc<dyn LocationExtractor>>,
    pub search: Option<Arc<dyn WebSearcher>>,
    pub embedder: Option<Arc<dyn TextEmbedder>>,
    pub fetcher: Arc<dyn PageFetcher>,
}

impl Toolkit {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            places: None,
            language: None,
            search: None,
            embedder: None,
            fetcher,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_places(mut self, places: Arc<dyn PlaceSearch>) -> Self {
        self.places = Some(places);
        self
    }

    pub fn with_language(mut self, language: Arc<dyn LocationExtractor>) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearcher>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// Resolves the toolkit for a request's credentials.
pub trait Backends: Send + Sync {
    fn toolkit(&self, credentials: &Credentials) -> Result<Toolkit>;
}

/// A fixed toolkit ignores credentials.
impl Backends for Toolkit {
    fn toolkit(&self, _credentials: &Credentials) -> Result<Toolkit> {
        Ok(self.clone())
    }
}
