// SPDX-License-Identifier: Apache-2.0
//! Per-request context threaded through every pipeline stage.

use std::sync::Arc;
use std::time::Instant;

use conduit_config::Config;
use conduit_mcp::ToolManager;
use conduit_providers::ProviderKeys;
use conduit_storage::Store;
use conduit_trace::{Alerter, AuditLogger, TraceSpan};

/// Everything a stage needs besides the request body itself.
///
/// Cloning is cheap: every field is an `Arc` or a small `Copy`/`String`
/// value, so stages that spawn concurrent work (the tool loop's per-server
/// dispatch, §4.11.3) can clone a context per task.
#[derive(Clone)]
pub struct RequestContext {
    pub agent_name: String,
    pub session_id: Option<String>,
    /// `X-Force-Model` header: bypasses the smart router and A/B
    /// experimenter when set (§4.1).
    pub force_model: Option<String>,
    pub trace: Arc<TraceSpan>,
    pub started_at: Instant,
    pub config: Arc<Config>,
    pub store: Store,
    pub tools: Option<Arc<ToolManager>>,
    pub keys: ProviderKeys,
    pub audit: Arc<AuditLogger>,
    pub alerter: Arc<Alerter>,
}

impl RequestContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_name: String,
        session_id: Option<String>,
        force_model: Option<String>,
        config: Arc<Config>,
        store: Store,
        tools: Option<Arc<ToolManager>>,
        keys: ProviderKeys,
        audit: Arc<AuditLogger>,
        alerter: Arc<Alerter>,
    ) -> Self {
        RequestContext {
            agent_name,
            session_id,
            force_model,
            trace: Arc::new(TraceSpan::new()),
            started_at: Instant::now(),
            config,
            store,
            tools,
            keys,
            audit,
            alerter,
        }
    }

    pub fn trace_id(&self) -> &str {
        self.trace.id()
    }
}
