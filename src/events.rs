//! Event model for streamed model and agent output.
//!
//! [`AgentEvent`] is the discriminated record emitted during a single model
//! or agent invocation: stream lifecycle, incremental text deltas, the tool
//! call lifecycle, and tool results. Emission order is significant and is
//! preserved end to end; sequences are produced lazily and may never
//! terminate if the upstream hangs.
//!
//! This module also defines the outbound envelope used for structured tool
//! streaming: a synthetic `"tool"`-role message wrapping a raw tool output
//! (see [`ToolMessage::wrap`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Streaming events emitted during one model or agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum AgentEvent {
    /// Indicates the start of a new streaming response.
    #[serde(rename = "stream.start")]
    StreamStart {
        /// Unique identifier for this request/response pair.
        request_id: String,
    },

    /// Incremental text delta from the assistant's response.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// The text fragment to append.
        text: String,
    },

    /// Incremental tool call delta (streaming tool call assembly).
    #[serde(rename = "tool_call.delta")]
    ToolCallDelta {
        /// Index of this tool call in the current batch.
        call_index: usize,
        /// Tool call ID (may arrive in the first delta or later).
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool/function name (may arrive in the first delta or later).
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Incremental arguments JSON fragment.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },

    /// Tool call is fully assembled and ready for execution.
    #[serde(rename = "tool_call.complete")]
    ToolCallComplete {
        /// Index of this tool call in the current batch.
        call_index: usize,
        /// Tool call ID.
        id: String,
        /// Tool/function name.
        name: String,
        /// Complete arguments as a JSON string.
        arguments_json: String,
    },

    /// Result from executing a tool.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// Tool call ID this result corresponds to.
        id: String,
        /// Tool/function name.
        name: String,
        /// Result content (typically JSON).
        content: String,
        /// Whether the tool execution succeeded.
        success: bool,
    },

    /// An error occurred during streaming.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
        /// Optional error code for programmatic handling.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Stream has completed successfully.
    #[serde(rename = "done")]
    Done,
}

/// Get the SSE event name for an [`AgentEvent`].
pub fn event_name(evt: &AgentEvent) -> &'static str {
    match evt {
        AgentEvent::StreamStart { .. } => "stream.start",
        AgentEvent::MessageDelta { .. } => "message.delta",
        AgentEvent::ToolCallDelta { .. } => "tool_call.delta",
        AgentEvent::ToolCallComplete { .. } => "tool_call.complete",
        AgentEvent::ToolResult { .. } => "tool_result",
        AgentEvent::Error { .. } => "error",
        AgentEvent::Done => "done",
    }
}

/// A synthetic `"tool"`-role message wrapping a raw tool output.
///
/// This is the canonical outbound envelope for structured tool streaming:
/// a freshly generated identifier, a fixed role marker, empty primary
/// content, and a nested function-call record carrying the tool name and
/// the JSON-serialized tool output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolMessage {
    /// Freshly generated message identifier.
    pub id: String,
    /// Always `"tool"`.
    pub role: String,
    /// Always empty; the payload lives in `tool_calls`.
    pub content: String,
    /// The wrapped function-call records.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// One function-call record inside a [`ToolMessage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallRecord {
    /// Freshly generated call identifier.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function name and serialized arguments.
    pub function: FunctionCall,
}

/// Function name plus JSON-serialized arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    /// Tool/function name.
    pub name: String,
    /// Pretty-printed JSON serialization of the tool output.
    pub arguments: String,
}

impl ToolMessage {
    /// Wrap a raw tool output as a synthetic tool message.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be serialized to JSON.
    pub fn wrap(tool_name: &str, output: &serde_json::Value) -> serde_json::Result<Self> {
        let arguments = serde_json::to_string_pretty(output)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            role: "tool".to_string(),
            content: String::new(),
            tool_calls: vec![ToolCallRecord {
                id: Uuid::new_v4().to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: tool_name.to_string(),
                    arguments,
                },
            }],
        })
    }
}
