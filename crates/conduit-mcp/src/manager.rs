// SPDX-License-Identifier: Apache-2.0
//! The tool manager (`spec.md` §4.14 "Manager"): one client per configured
//! server, a flattened tool catalog tagged by owning server, and per-agent
//! allow/deny access control.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::client::{McpClient, McpServerSpec};
use crate::error::{McpError, McpResult};
use crate::protocol::ToolDescriptor;

/// Per-agent tool access rule. `allow` takes precedence over `deny` when
/// both are set; an agent with neither sees every tool.
#[derive(Debug, Clone, Default)]
pub struct AgentAccess {
    pub allow: Option<Vec<String>>,
    pub deny: Option<Vec<String>>,
}

impl AgentAccess {
    fn permits(&self, tool_name: &str) -> bool {
        if let Some(allow) = &self.allow {
            return allow.iter().any(|t| t == tool_name);
        }
        if let Some(deny) = &self.deny {
            return !deny.iter().any(|t| t == tool_name);
        }
        true
    }
}

struct RegisteredTool {
    server: String,
    descriptor: ToolDescriptor,
}

pub struct ToolManager {
    clients: HashMap<String, Arc<McpClient>>,
    tools: HashMap<String, RegisteredTool>,
    access: HashMap<String, AgentAccess>,
}

impl ToolManager {
    /// Spawn one client per `specs` entry, call `tools/list` on each, and
    /// flatten the results. On a tool-name collision across servers the
    /// first-registered server wins and the collision is logged — `specs`
    /// order is therefore significant and should match configuration order.
    pub async fn start(
        specs: Vec<McpServerSpec>,
        access: HashMap<String, AgentAccess>,
    ) -> McpResult<Self> {
        let mut clients = HashMap::new();
        let mut tools: HashMap<String, RegisteredTool> = HashMap::new();

        for spec in specs {
            let server_name = spec.name.clone();
            let client = Arc::new(McpClient::spawn(spec).await?);
            let descriptors = client.list_tools().await?;
            for descriptor in descriptors {
                if let Some(existing) = tools.get(&descriptor.name) {
                    warn!(
                        tool = %descriptor.name,
                        existing_server = %existing.server,
                        new_server = %server_name,
                        "MCP: tool name collision, keeping first-registered server"
                    );
                    continue;
                }
                tools.insert(
                    descriptor.name.clone(),
                    RegisteredTool {
                        server: server_name.clone(),
                        descriptor,
                    },
                );
            }
            clients.insert(server_name, client);
        }

        Ok(ToolManager { clients, tools, access })
    }

    /// Tool definitions visible to `agent_name`, in the provider-neutral
    /// shape the upstream client translates per-provider (§4.11.2).
    pub fn tools_for_agent(&self, agent_name: &str) -> Vec<ToolDescriptor> {
        let rule = self.access.get(agent_name);
        self.tools
            .values()
            .filter(|t| rule.map(|r| r.permits(&t.descriptor.name)).unwrap_or(true))
            .map(|t| t.descriptor.clone())
            .collect()
    }

    pub fn has_tools_for_agent(&self, agent_name: &str) -> bool {
        !self.tools_for_agent(agent_name).is_empty()
    }

    /// Route `tool_name` to its owning server and invoke it, after checking
    /// `agent_name`'s access. Returns the concatenated text content; a tool
    /// that sets `isError` is still returned (the LLM is the one that reacts
    /// to it) rather than surfaced as an `Err` here — only an unreachable
    /// server or an access violation is an `Err`.
    pub async fn call_tool(
        &self,
        agent_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> McpResult<(String, bool)> {
        if let Some(rule) = self.access.get(agent_name) {
            if !rule.permits(tool_name) {
                return Err(McpError::AccessDenied(agent_name.to_string(), tool_name.to_string()));
            }
        }
        let registered = self
            .tools
            .get(tool_name)
            .ok_or_else(|| McpError::UnknownTool(tool_name.to_string()))?;
        let client = self
            .clients
            .get(&registered.server)
            .ok_or_else(|| McpError::UnknownTool(tool_name.to_string()))?;
        let result = client.call_tool(tool_name, arguments).await?;
        Ok((result.text(), result.is_error))
    }

    pub async fn shutdown(&self) {
        for client in self.clients.values() {
            client.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_takes_precedence_over_deny() {
        let rule = AgentAccess {
            allow: Some(vec!["search".into()]),
            deny: Some(vec!["search".into()]),
        };
        assert!(rule.permits("search"));
        assert!(!rule.permits("write_file"));
    }

    #[test]
    fn deny_blocks_listed_tools_only() {
        let rule = AgentAccess {
            allow: None,
            deny: Some(vec!["write_file".into()]),
        };
        assert!(rule.permits("search"));
        assert!(!rule.permits("write_file"));
    }

    #[test]
    fn unconfigured_agent_sees_everything() {
        let rule = AgentAccess::default();
        assert!(rule.permits("anything"));
    }
}
