// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to spawn MCP server process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("MCP server closed stdio before responding")]
    Closed,
    #[error("MCP server returned malformed JSON-RPC: {0}")]
    Protocol(String),
    #[error("MCP server returned an error: {code} {message}")]
    Remote { code: i64, message: String },
    #[error("call to server '{0}' timed out")]
    Timeout(String),
    #[error("no MCP server owns tool '{0}'")]
    UnknownTool(String),
    #[error("agent '{0}' is not permitted to use tool '{1}'")]
    AccessDenied(String, String),
}

pub type McpResult<T> = Result<T, McpError>;
