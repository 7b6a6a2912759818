// SPDX-License-Identifier: Apache-2.0
//! MCP client and tool manager (`spec.md` §4.14): newline-delimited
//! JSON-RPC 2.0 over child-process stdio, hand-rolled rather than built on
//! a higher-level MCP SDK so the exact line-framing invariant is testable.

mod client;
mod error;
mod manager;
mod protocol;

pub use client::{McpClient, McpServerSpec};
pub use error::{McpError, McpResult};
pub use manager::{AgentAccess, ToolManager};
pub use protocol::{ContentBlock, RpcError, RpcRequest, RpcResponse, ToolCallResult, ToolDescriptor};
