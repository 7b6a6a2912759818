// SPDX-License-Identifier: Apache-2.0
//! Shared state handed to every route handler.

use std::sync::Arc;

use conduit_config::Config;
use conduit_core::Pipeline;
use conduit_mcp::ToolManager;
use conduit_pricing::PricingTable;
use conduit_providers::ProviderKeys;
use conduit_storage::Store;
use conduit_trace::{Alerter, AuditLogger};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
    pub store: Store,
    pub tools: Option<Arc<ToolManager>>,
    pub keys: ProviderKeys,
    pub audit: Arc<AuditLogger>,
    pub alerter: Arc<Alerter>,
    pub pricing: Arc<PricingTable>,
}
