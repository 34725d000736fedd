mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use crate::traits::EmbedAgent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use client::OpenAiClient;

const DEFAULT_MAX_TOKENS: u32 = 4096;

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    embedding_model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Share a connection pool (and its timeouts) with the caller.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.http.clone());
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }

    /// Simple chat completion.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = types::ChatRequest::new(&self.model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user))
            .limits(DEFAULT_MAX_TOKENS);

        self.client().chat(&request).await
    }

    /// Structured output against a raw JSON schema. Returns the model's JSON text.
    pub async fn structured_output(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = types::ChatRequest::new(&self.model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user))
            .limits(DEFAULT_MAX_TOKENS)
            .response_format(types::ResponseFormat::strict(schema));

        self.client().chat(&request).await
    }

    /// Type-safe structured output.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<T> {
        let system = system.into();
        let user = user.into();
        let json_str = self
            .structured_output(&system, &user, T::openai_schema())
            .await?;

        serde_json::from_str(&json_str)
            .map_err(|e| anyhow!("Failed to deserialize response: {}", e))
    }
}

// =============================================================================
// EmbedAgent Implementation
// =============================================================================

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed(&self, text: impl Into<String> + Send) -> Result<Vec<f32>> {
        self.client()
            .embed_batch(&self.embedding_model, &[text.into()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding in response"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client()
            .embed_batch(&self.embedding_model, &texts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini");
        assert_eq!(ai.model(), "gpt-4o-mini");
        assert_eq!(ai.embedding_model(), "text-embedding-3-small");
        assert!(ai.base_url.is_none());
    }

    #[test]
    fn test_openai_builders() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini")
            .with_embedding_model("text-embedding-3-large")
            .with_base_url("https://proxy.internal/v1");
        assert_eq!(ai.embedding_model(), "text-embedding-3-large");
        assert_eq!(ai.base_url.as_deref(), Some("https://proxy.internal/v1"));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini").with_base_url("http://127.0.0.1:9");
        let vectors = ai.embed_batch(Vec::new()).await.unwrap();
        assert!(vectors.is_empty());
    }
}
