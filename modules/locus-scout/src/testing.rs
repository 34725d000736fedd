// Test mocks for the discovery pipeline.
//
// One mock per backend trait, all builder-configured:
// - MockPlaces (PlaceSearch): query→hits, place_id→contact
// - MockExtractor (LocationExtractor): text-needle→candidates
// - MockSearcher (WebSearcher): query→hits
// - MockFetcher (PageFetcher): URL→page, Err for unregistered URLs
// - FixedEmbedder (TextEmbedder): deterministic hash-based vectors
//
// Plus test agents for driving the controller: StaticAgent, SlowAgent,
// PanickingAgent, and PanickingBackends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use locus_common::{Credentials, LocationRecord, Source};

use crate::agents::{AgentRequest, Readiness, SourceAgent};
use crate::traits::{
    Backends, CandidateLocation, ExtractionHint, FetchedPage, LocationExtractor, PageFetcher,
    PlaceContact, PlaceHit, PlaceSearch, SearchHit, TextEmbedder, Toolkit, WebSearcher,
};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Standard embedding dimension for test vectors.
pub const TEST_EMBEDDING_DIM: usize = 64;

/// A toolkit with no credentialed backends and a fetcher that knows no pages.
pub fn toolkit() -> Toolkit {
    Toolkit::new(Arc::new(MockFetcher::new()))
}

// ---------------------------------------------------------------------------
// MockPlaces
// ---------------------------------------------------------------------------

/// Unregistered queries return no hits; unregistered place ids are errors.
#[derive(Default)]
pub struct MockPlaces {
    searches: HashMap<String, Vec<PlaceHit>>,
    details: HashMap<String, PlaceContact>,
    failing: bool,
}

impl MockPlaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, hits: Vec<PlaceHit>) -> Self {
        self.searches.insert(query.to_string(), hits);
        self
    }

    pub fn on_details(mut self, place_id: &str, contact: PlaceContact) -> Self {
        self.details.insert(place_id.to_string(), contact);
        self
    }

    /// Every call fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }
}

#[async_trait]
impl PlaceSearch for MockPlaces {
    async fn search(&self, query: &str) -> Result<Vec<PlaceHit>> {
        if self.failing {
            bail!("places backend unavailable");
        }
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }

    async fn details(&self, place_id: &str) -> Result<PlaceContact> {
        if self.failing {
            bail!("places backend unavailable");
        }
        self.details
            .get(place_id)
            .cloned()
            .ok_or_else(|| anyhow!("MockPlaces: no details registered for {place_id}"))
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Answers with the candidates of the first registered needle found in the
/// text, and with nothing otherwise.
#[derive(Default)]
pub struct MockExtractor {
    rules: Vec<(String, Vec<CandidateLocation>)>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_text_containing(mut self, needle: &str, candidates: Vec<CandidateLocation>) -> Self {
        self.rules.push((needle.to_string(), candidates));
        self
    }
}

#[async_trait]
impl LocationExtractor for MockExtractor {
    async fn extract_locations(
        &self,
        text: &str,
        _hint: &ExtractionHint,
    ) -> Result<Vec<CandidateLocation>> {
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, candidates)| candidates.clone())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Unregistered queries return no hits.
#[derive(Default)]
pub struct MockSearcher {
    searches: HashMap<String, Vec<SearchHit>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.searches.insert(query.to_string(), hits);
        self
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let mut hits = self.searches.get(query).cloned().unwrap_or_default();
        hits.truncate(max_results);
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Pages are keyed by their own URL. Returns `Err` for unregistered URLs.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, FetchedPage>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, page: FetchedPage) -> Self {
        self.pages.insert(page.url.clone(), page);
        self
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("MockFetcher: no page registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder for testing. Registered texts get exact vectors;
/// unmatched texts get a unique hash-based vector (low similarity to everything).
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
        }
    }

    pub fn on_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        self.vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hash_vector(text))
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vec = vec![0.0f32; self.dimension];
        for v in vec.iter_mut() {
            // LCG
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl TextEmbedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("embedding service unavailable")
    }

    async fn embed_batch(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unavailable")
    }
}

// ---------------------------------------------------------------------------
// Test agents
// ---------------------------------------------------------------------------

/// Always ready; returns a fixed record list.
pub struct StaticAgent {
    source: Source,
    records: Vec<LocationRecord>,
}

impl StaticAgent {
    pub fn new(source: Source, records: Vec<LocationRecord>) -> Self {
        Self { source, records }
    }
}

#[async_trait]
impl SourceAgent for StaticAgent {
    fn source(&self) -> Source {
        self.source
    }

    fn readiness(&self, _request: &AgentRequest) -> Readiness {
        Readiness::Ready
    }

    async fn try_extract(&self, _request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        Ok(self.records.clone())
    }
}

/// Sleeps before returning its records.
pub struct SlowAgent {
    source: Source,
    delay: Duration,
    records: Vec<LocationRecord>,
}

impl SlowAgent {
    pub fn new(source: Source, delay: Duration) -> Self {
        Self {
            source,
            delay,
            records: Vec::new(),
        }
    }

    pub fn with_records(mut self, records: Vec<LocationRecord>) -> Self {
        self.records = records;
        self
    }
}

#[async_trait]
impl SourceAgent for SlowAgent {
    fn source(&self) -> Source {
        self.source
    }

    fn readiness(&self, _request: &AgentRequest) -> Readiness {
        Readiness::Ready
    }

    async fn try_extract(&self, _request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.records.clone())
    }
}

/// Panics inside its task.
pub struct PanickingAgent(pub Source);

#[async_trait]
impl SourceAgent for PanickingAgent {
    fn source(&self) -> Source {
        self.0
    }

    fn readiness(&self, _request: &AgentRequest) -> Readiness {
        Readiness::Ready
    }

    async fn try_extract(&self, _request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        panic!("agent blew up")
    }
}

/// Panics while resolving the toolkit, outside any agent task.
pub struct PanickingBackends;

impl Backends for PanickingBackends {
    fn toolkit(&self, _credentials: &Credentials) -> Result<Toolkit> {
        panic!("backend resolution blew up")
    }
}

/// Refuses every credential set.
pub struct FailingBackends;

impl Backends for FailingBackends {
    fn toolkit(&self, _credentials: &Credentials) -> Result<Toolkit> {
        bail!("failed to build HTTP client")
    }
}
