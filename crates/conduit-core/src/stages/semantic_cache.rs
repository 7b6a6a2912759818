// SPDX-License-Identifier: Apache-2.0
//! Response caching (`spec.md` §4.7): an exact SHA-256 match on the
//! canonical user content first, then — when an embedder is configured —
//! a cosine-similarity scan over recent entries for the same model.
//! Non-streaming requests only; a streaming request always bypasses the
//! cache on both read and write.

use std::sync::Arc;

use chrono::{Duration, Utc};
use conduit_config::CacheConfig;
use conduit_providers::embedding::{cosine_similarity, decode_embedding, encode_embedding, EmbeddingClient};
use conduit_providers::ChatCompletionResponse;
use conduit_storage::{CacheEntry, Store};

use crate::error::PipelineError;

pub enum CacheLookup {
    Hit(ChatCompletionResponse),
    Miss { embedding: Option<Vec<f32>> },
}

/// Look up a cached response for `(hash, model)`. When no exact match
/// exists and `embedder` is set, scan the most recent candidates for the
/// same model and return the highest-similarity one above
/// `cfg.similarity_threshold`. The computed query embedding (if any) is
/// returned on a miss so the caller can reuse it when writing the entry.
pub async fn lookup(
    store: &Store,
    cfg: &CacheConfig,
    embedder: Option<&Arc<dyn EmbeddingClient>>,
    hash: &str,
    model: &str,
    canonical_content: &str,
) -> Result<CacheLookup, PipelineError> {
    if !cfg.enabled {
        return Ok(CacheLookup::Miss { embedding: None });
    }

    let cutoff = Utc::now() - Duration::minutes(cfg.ttl_minutes);

    if let Some(entry) = store.cache_lookup(hash, model).await? {
        if entry.created_at < cutoff {
            store.cache_delete(hash, model).await?;
        } else if let Ok(resp) = serde_json::from_slice(&entry.response_body) {
            return Ok(CacheLookup::Hit(resp));
        }
    }

    let Some(embedder) = embedder else { return Ok(CacheLookup::Miss { embedding: None }) };
    let query_embedding = match embedder.embed(canonical_content).await {
        Ok(v) => v,
        Err(_) => return Ok(CacheLookup::Miss { embedding: None }),
    };

    let candidates = store.cache_candidates(model, cutoff).await?;
    let mut best: Option<(f32, &CacheEntry)> = None;
    for candidate in &candidates {
        let Some(blob) = candidate.embedding.as_ref() else { continue };
        let sim = cosine_similarity(&query_embedding, &decode_embedding(blob));
        if sim >= cfg.similarity_threshold as f32 && best.as_ref().map(|(s, _)| sim > *s).unwrap_or(true) {
            best = Some((sim, candidate));
        }
    }

    match best {
        Some((_, entry)) => match serde_json::from_slice(&entry.response_body) {
            Ok(resp) => Ok(CacheLookup::Hit(resp)),
            Err(_) => Ok(CacheLookup::Miss { embedding: Some(query_embedding) }),
        },
        None => Ok(CacheLookup::Miss { embedding: Some(query_embedding) }),
    }
}

/// Write `resp` into the cache, keyed by `(hash, model)`. Idempotent: a
/// repeated write with the same key overwrites rather than duplicating.
pub async fn store_response(
    store: &Store,
    hash: &str,
    model: &str,
    resp: &ChatCompletionResponse,
    embedding: Option<Vec<f32>>,
) -> Result<(), PipelineError> {
    let entry = CacheEntry {
        sha256_hash: hash.to_string(),
        model: model.to_string(),
        response_body: serde_json::to_vec(resp).map_err(|e| PipelineError::Internal(e.to_string()))?,
        embedding: embedding.map(|v| encode_embedding(&v)),
        created_at: Utc::now(),
    };
    store.cache_upsert(&entry).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_providers::{Choice, Usage};

    fn sample_response() -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: Some("resp-1".into()),
            model: "gpt-4o".into(),
            choices: vec![Choice { index: 0, message: serde_json::from_value(serde_json::json!({"role": "assistant", "content": "hi"})).unwrap(), finish_reason: Some("stop".into()) }],
            usage: Usage { prompt_tokens: 1, completion_tokens: 1 },
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let cfg = CacheConfig { enabled: false, similarity_threshold: 0.95, ttl_minutes: 60 };
        let result = lookup(&store, &cfg, None, "hash1", "gpt-4o", "hello").await.unwrap();
        assert!(matches!(result, CacheLookup::Miss { embedding: None }));
    }

    #[tokio::test]
    async fn exact_hash_hit_round_trips() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let cfg = CacheConfig { enabled: true, similarity_threshold: 0.95, ttl_minutes: 60 };
        let resp = sample_response();
        store_response(&store, "hash1", "gpt-4o", &resp, None).await.unwrap();
        let result = lookup(&store, &cfg, None, "hash1", "gpt-4o", "hello").await.unwrap();
        match result {
            CacheLookup::Hit(got) => assert_eq!(got.id, resp.id),
            CacheLookup::Miss { .. } => panic!("expected hit"),
        }
    }

    #[tokio::test]
    async fn expired_entry_misses_and_is_evicted() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let cfg = CacheConfig { enabled: true, similarity_threshold: 0.95, ttl_minutes: 60 };
        let resp = sample_response();
        let entry = CacheEntry {
            sha256_hash: "hash1".into(),
            model: "gpt-4o".into(),
            response_body: serde_json::to_vec(&resp).unwrap(),
            embedding: None,
            created_at: Utc::now() - Duration::minutes(cfg.ttl_minutes + 1),
        };
        store.cache_upsert(&entry).await.unwrap();

        let result = lookup(&store, &cfg, None, "hash1", "gpt-4o", "hello").await.unwrap();
        assert!(matches!(result, CacheLookup::Miss { .. }));
        assert!(store.cache_lookup("hash1", "gpt-4o").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn miss_on_different_model() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let cfg = CacheConfig { enabled: true, similarity_threshold: 0.95, ttl_minutes: 60 };
        let resp = sample_response();
        store_response(&store, "hash1", "gpt-4o", &resp, None).await.unwrap();
        let result = lookup(&store, &cfg, None, "hash1", "gpt-4o-mini", "hello").await.unwrap();
        assert!(matches!(result, CacheLookup::Miss { .. }));
    }
}
