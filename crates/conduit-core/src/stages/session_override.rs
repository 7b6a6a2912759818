// SPDX-License-Identifier: Apache-2.0
//! Session override application (`spec.md` §4.4): rewrite `model`,
//! `temperature`, `max_tokens` from a stored override, applied only while
//! non-expired at lookup time. Field-by-field: an override that sets only
//! `temperature` leaves `model` and `max_tokens` as the caller sent them.

use chrono::Utc;
use conduit_storage::Store;

use crate::error::PipelineError;
use conduit_providers::ChatCompletionRequest;

pub async fn apply(
    store: &Store,
    session_id: Option<&str>,
    mut req: ChatCompletionRequest,
) -> Result<ChatCompletionRequest, PipelineError> {
    let Some(session_id) = session_id else { return Ok(req) };
    let Some(ov) = store.session_get(session_id).await? else { return Ok(req) };
    if ov.expires_at <= Utc::now() {
        return Ok(req);
    }
    if let Some(model) = ov.model {
        req.model = model;
    }
    if let Some(temperature) = ov.temperature {
        req.temperature = Some(temperature);
    }
    if let Some(max_tokens) = ov.max_tokens {
        req.max_tokens = Some(max_tokens as u32);
    }
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use conduit_storage::SessionOverride;
    use serde_json::json;

    fn sample_req() -> ChatCompletionRequest {
        serde_json::from_value(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn non_expired_override_rewrites_only_set_fields() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let ov = SessionOverride {
            session_id: "sess-1".into(),
            agent_name: "agent-a".into(),
            model: Some("gpt-4o-mini".into()),
            temperature: None,
            max_tokens: Some(500),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        store.session_put(&ov).await.unwrap();
        let req = apply(&store, Some("sess-1"), sample_req()).await.unwrap();
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.max_tokens, Some(500));
        assert_eq!(req.temperature, None);
    }

    #[tokio::test]
    async fn expired_override_is_ignored() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let ov = SessionOverride {
            session_id: "sess-2".into(),
            agent_name: "agent-a".into(),
            model: Some("gpt-4o-mini".into()),
            temperature: None,
            max_tokens: None,
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Utc::now() - Duration::hours(1),
        };
        store.session_put(&ov).await.unwrap();
        let req = apply(&store, Some("sess-2"), sample_req()).await.unwrap();
        assert_eq!(req.model, "gpt-4o");
    }

    #[tokio::test]
    async fn missing_session_id_is_a_no_op() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let req = apply(&store, None, sample_req()).await.unwrap();
        assert_eq!(req.model, "gpt-4o");
    }
}
