//! Data types crossing the gateway's boundaries.
//!
//! [`ToolResponse`] mirrors the MCP `CallToolResult` envelope so the dispatcher
//! can be exercised without an MCP transport. [`ExecutionResult`] is what a
//! finished remote command produced.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single content block of a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Uniform response envelope for every tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    /// Successful response with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Error response with a single text block.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// All text blocks joined with newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Captured outcome of one remote command.
///
/// A nonzero `exit_code` or a `signal` describes the remote process; it does
/// not make the invocation a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Remote exit status, `-1` when the server never reported one. Wide
    /// enough for every `u32` the protocol can carry.
    pub exit_code: i64,
    /// Name of the signal that terminated the command, if any.
    pub signal: Option<String>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ExecutionResult {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod tool_response {
        use super::*;

        #[test]
        fn test_text_response_json_shape() {
            let response = ToolResponse::text("hello");
            let json = serde_json::to_value(&response).unwrap();

            assert_eq!(
                json,
                serde_json::json!({"content": [{"type": "text", "text": "hello"}]})
            );
        }

        #[test]
        fn test_error_response_sets_is_error() {
            let response = ToolResponse::error("Unknown tool: nope");
            let json = serde_json::to_value(&response).unwrap();

            assert_eq!(json.get("isError"), Some(&serde_json::json!(true)));
            assert_eq!(json["content"][0]["text"], "Unknown tool: nope");
        }

        #[test]
        fn test_missing_is_error_deserializes_as_false() {
            let response: ToolResponse =
                serde_json::from_str(r#"{"content": [{"type": "text", "text": "ok"}]}"#).unwrap();
            assert!(!response.is_error);
            assert_eq!(response.joined_text(), "ok");
        }

        #[test]
        fn test_joined_text_concatenates_blocks() {
            let response = ToolResponse {
                content: vec![
                    ContentBlock::Text {
                        text: "a".to_string(),
                    },
                    ContentBlock::Text {
                        text: "b".to_string(),
                    },
                ],
                is_error: false,
            };
            assert_eq!(response.joined_text(), "a\nb");
        }
    }

    mod execution_result {
        use super::*;

        #[test]
        fn test_lossy_decoding_replaces_invalid_utf8() {
            let result = ExecutionResult {
                stdout: vec![b'o', b'k', 0xff],
                ..Default::default()
            };
            assert_eq!(result.stdout_lossy(), "ok\u{fffd}");
        }
    }
}
