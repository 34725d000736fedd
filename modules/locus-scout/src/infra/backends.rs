use std::sync::Arc;
use std::time::Duration;

use ai_client::openai::OpenAi;
use anyhow::{Context, Result};
use places_client::PlacesClient;
use tracing::debug;

use locus_common::{Config, Credentials};

use crate::admission::AdmissionControl;
use crate::infra::embedder::Embedder;
use crate::infra::extractor::LlmExtractor;
use crate::infra::fetcher::HttpFetcher;
use crate::infra::places::GooglePlaces;
use crate::infra::searcher::TavilySearcher;
use crate::traits::{Backends, Toolkit};

const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds real backend adapters from request credentials, falling back to
/// the configured keys. Admission gates and the HTTP pool are shared by
/// every job this instance serves.
pub struct LiveBackends {
    config: Config,
    http: reqwest::Client,
    fetcher: Arc<HttpFetcher>,
    admission: AdmissionControl,
}

impl LiveBackends {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(API_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        let fetcher = Arc::new(HttpFetcher::new(&config.user_agent)?);
        let admission = AdmissionControl::new(config.max_backend_concurrency);
        Ok(Self {
            config,
            http,
            fetcher,
            admission,
        })
    }
}

impl Backends for LiveBackends {
    fn toolkit(&self, credentials: &Credentials) -> Result<Toolkit> {
        let credentials = credentials.clone().or(&self.config.credentials);
        let mut toolkit = Toolkit::new(self.fetcher.clone());

        if let Some(key) = credentials.google_maps_api_key.as_deref() {
            let client = PlacesClient::with_http_client(key, self.http.clone());
            let gate = self.admission.gate("google_places", key);
            toolkit = toolkit.with_places(Arc::new(GooglePlaces::new(client, gate)));
        }

        if let Some(key) = credentials.openai_api_key.as_deref() {
            let openai = OpenAi::new(key, self.config.llm_model.as_str())
                .with_embedding_model(self.config.embedding_model.as_str())
                .with_http_client(self.http.clone());
            let gate = self.admission.gate("openai", key);
            toolkit = toolkit
                .with_language(Arc::new(LlmExtractor::new(openai.clone(), gate.clone())))
                .with_embedder(Arc::new(Embedder::new(openai, gate)));
        }

        if let Some(key) = credentials.tavily_api_key.as_deref() {
            let gate = self.admission.gate("tavily", key);
            toolkit = toolkit.with_search(Arc::new(TavilySearcher::new(
                key.to_string(),
                self.http.clone(),
                gate,
            )));
        }

        debug!(
            places = toolkit.places.is_some(),
            language = toolkit.language.is_some(),
            search = toolkit.search.is_some(),
            embedder = toolkit.embedder.is_some(),
            "Resolved backends for job"
        );
        Ok(toolkit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_leave_backends_unset() {
        let backends = LiveBackends::new(Config::default()).unwrap();
        let toolkit = backends.toolkit(&Credentials::default()).unwrap();
        assert!(toolkit.places.is_none());
        assert!(toolkit.language.is_none());
        assert!(toolkit.search.is_none());
        assert!(toolkit.embedder.is_none());
    }

    #[test]
    fn request_keys_enable_backends() {
        let backends = LiveBackends::new(Config::default()).unwrap();
        let credentials = Credentials {
            openai_api_key: Some("sk-test".into()),
            google_maps_api_key: None,
            tavily_api_key: Some("tvly-test".into()),
        };
        let toolkit = backends.toolkit(&credentials).unwrap();
        assert!(toolkit.language.is_some());
        assert!(toolkit.embedder.is_some());
        assert!(toolkit.search.is_some());
        assert!(toolkit.places.is_none());
    }

    #[test]
    fn config_keys_are_the_fallback() {
        let mut config = Config::default();
        config.credentials.google_maps_api_key = Some("maps-key".into());
        let backends = LiveBackends::new(config).unwrap();
        let toolkit = backends.toolkit(&Credentials::default()).unwrap();
        assert!(toolkit.places.is_some());
    }
}
