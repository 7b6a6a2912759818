// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end tests that boot the real axum router on a loopback port and
//! drive it with an HTTP client, exercising routes that don't need a live
//! upstream model provider.

use std::sync::Arc;

use conduit_core::Pipeline;
use conduit_providers::ProviderKeys;
use conduit_server::state::AppState;
use conduit_storage::Store;
use conduit_trace::{Alerter, AuditLogger, NullSink};
use tokio::net::TcpListener;

async fn spawn_test_server() -> (String, tokio::task::JoinHandle<()>) {
    let config = Arc::new(conduit_config::load_str("{}").expect("default config parses"));
    let store = Store::connect("sqlite::memory:").await.expect("in-memory sqlite opens");
    let audit = Arc::new(AuditLogger::spawn(store.clone()));
    let alerter = Arc::new(Alerter::new());
    let pricing = conduit_pricing::PricingTable::with_defaults();
    let pipeline = Arc::new(Pipeline::new(pricing.clone(), Arc::new(NullSink), None, None));

    let state = AppState {
        pipeline,
        config,
        store,
        tools: None,
        keys: ProviderKeys::default(),
        audit,
        alerter,
        pricing: Arc::new(pricing),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("binds an ephemeral port");
    let addr = listener.local_addr().expect("listener has a local address");
    let app = conduit_server::router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs to completion");
    });
    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, handle) = spawn_test_server().await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    handle.abort();
}

#[tokio::test]
async fn models_lists_the_pricing_table() {
    let (base, handle) = spawn_test_server().await;
    let resp = reqwest::get(format!("{base}/v1/models")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["object"], "list");
    assert!(body["data"].as_array().unwrap().iter().any(|m| m["id"] == "gpt-4o"));
    handle.abort();
}

#[tokio::test]
async fn chat_completions_without_a_configured_key_surfaces_as_internal_error() {
    let (base, handle) = spawn_test_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hello"}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");
    handle.abort();
}

#[tokio::test]
async fn unknown_session_returns_404() {
    let (base, handle) = spawn_test_server().await;
    let resp = reqwest::get(format!("{base}/v1/sessions/does-not-exist")).await.unwrap();
    assert_eq!(resp.status(), 404);
    handle.abort();
}
