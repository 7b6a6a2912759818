// SPDX-License-Identifier: Apache-2.0
//! The embedding client the semantic cache uses for its similarity
//! fallback (`spec.md` §4.7). Vectors are encoded as dense little-endian
//! float32 blobs for storage in `cache_entries.embedding`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{ProviderError, ProviderResult};

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;
}

pub struct OpenAiEmbeddingClient {
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiEmbeddingClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiEmbeddingClient {
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let resp = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&json!({"model": self.model, "input": text}))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream { status, body, retry_after: None });
        }
        let v: serde_json::Value = resp.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;
        let floats = v
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| ProviderError::Decode("missing embedding in response".into()))?;
        floats
            .iter()
            .map(|f| f.as_f64().map(|f| f as f32).ok_or_else(|| ProviderError::Decode("non-numeric embedding component".into())))
            .collect()
    }
}

/// Encode a dense float32 vector as a little-endian byte blob
/// (`spec.md` §4.7 "Embedding encoding").
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for f in vector {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian float32 blob; vector length is implicit from
/// `blob.len() / 4`.
pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_round_trips_through_le_bytes() {
        let vector = vec![1.0_f32, -2.5, 0.0, 3.75];
        let blob = encode_embedding(&vector);
        assert_eq!(blob.len(), vector.len() * 4);
        let decoded = decode_embedding(&blob);
        assert_eq!(decoded, vector);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }
}
