// SPDX-License-Identifier: Apache-2.0
//! End-to-end check of the line-framing invariant (`spec.md` §8 property 8):
//! every line written to/read from the subprocess is one JSON object
//! terminated by exactly one `\n`. Spawns a tiny `sh` script standing in
//! for a real MCP server.

use std::collections::HashMap;

use conduit_mcp::{McpClient, McpServerSpec};

const FAKE_SERVER_SCRIPT: &str = r#"
while IFS= read -r line; do
  id=$(echo "$line" | sed -n 's/.*"id":\s*\([0-9]*\).*/\1/p')
  method=$(echo "$line" | sed -n 's/.*"method":"\([^"]*\)".*/\1/p')
  if [ -z "$id" ]; then
    continue
  fi
  case "$method" in
    initialize)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05"}}\n' "$id"
      ;;
    tools/list)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo","description":"echoes input"}]}}\n' "$id"
      ;;
    tools/call)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok"}],"isError":false}}\n' "$id"
      ;;
  esac
done
"#;

#[tokio::test]
async fn spawns_and_initializes_against_a_line_framed_server() {
    let spec = McpServerSpec {
        name: "fake".to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), FAKE_SERVER_SCRIPT.to_string()],
        env: HashMap::new(),
    };

    let client = McpClient::spawn(spec).await.expect("client should initialize");
    let tools = client.list_tools().await.expect("tools/list should succeed");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");

    let result = client
        .call_tool("echo", serde_json::json!({"text": "hi"}))
        .await
        .expect("tools/call should succeed");
    assert_eq!(result.text(), "ok");
    assert!(!result.is_error);

    client.shutdown().await;
}
