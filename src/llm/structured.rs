//! Structured-output adaptation over the event stream.
//!
//! Forces the model to answer through a single function tool and turns the
//! resulting tool-call events back into parsed output objects: one
//! [`serde_json::Value`] per completed call. Argument fragments that arrive
//! split across chunks are reassembled before parsing.

use std::collections::BTreeMap;

use futures::{Stream, StreamExt};

use crate::events::AgentEvent;

/// Build a `tool_choice` value forcing the named function.
pub fn force_tool_choice(name: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": { "name": name }
    })
}

/// Adapt an [`AgentEvent`] stream into a stream of parsed tool outputs.
///
/// Each `tool_call.complete` event yields one value; text deltas are
/// ignored. An `error` event or an unparseable arguments payload raises
/// from the sequence.
pub fn structured_stream<S>(
    events: S,
) -> impl Stream<Item = anyhow::Result<serde_json::Value>> + Send
where
    S: Stream<Item = anyhow::Result<AgentEvent>> + Send + 'static,
{
    async_stream::try_stream! {
        // Argument fragments per call index, for providers that never send
        // a tool_call.complete boundary of their own.
        let mut fragments: BTreeMap<usize, String> = BTreeMap::new();

        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match event? {
                AgentEvent::ToolCallDelta { call_index, arguments_delta, .. } => {
                    if let Some(delta) = arguments_delta {
                        fragments.entry(call_index).or_default().push_str(&delta);
                    }
                }
                AgentEvent::ToolCallComplete { call_index, arguments_json, .. } => {
                    fragments.remove(&call_index);
                    let value: serde_json::Value = serde_json::from_str(&arguments_json)
                        .map_err(|e| anyhow::anyhow!("malformed tool arguments: {e}"))?;
                    yield value;
                }
                AgentEvent::Error { message, .. } => {
                    Err(anyhow::anyhow!(message))?;
                }
                AgentEvent::Done => break,
                _ => {}
            }
        }
    }
}
