use ai_client::openai::OpenAi;
use ai_client::traits::EmbedAgent;
use anyhow::Result;
use async_trait::async_trait;

use crate::admission::AdmissionGate;
use crate::traits::TextEmbedder;

/// OpenAI embeddings behind the credential's admission gate.
pub struct Embedder {
    client: OpenAi,
    gate: AdmissionGate,
}

impl Embedder {
    pub fn new(client: OpenAi, gate: AdmissionGate) -> Self {
        Self { client, gate }
    }
}

#[async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self.gate.admit().await?;
        self.client.embed(text.to_string()).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let _permit = self.gate.admit().await?;
        self.client.embed_batch(texts).await
    }
}
