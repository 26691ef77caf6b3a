//! Agent execution: the tool loop over the LLM driver.
//!
//! The executor streams driver events, detects completed tool calls,
//! executes them against a registry of in-process [`Tool`] implementations,
//! feeds the results back into the conversation, and re-invokes the model
//! until it produces a final answer. The loop is bounded to avoid running
//! forever on a model that keeps requesting tools.
//!
//! All planning and tool selection lives inside the model; this layer only
//! wires calls to implementations and relays the event sequence.

pub mod search;

pub use search::WebSearchTool;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::events::AgentEvent;
use crate::llm::{LlmDriver, LlmRequest, function_tool};

/// Maximum number of tool loop iterations to prevent infinite loops.
const MAX_TOOL_ITERATIONS: usize = 10;

/// An in-process tool callable by the agent.
#[async_trait::async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Tool name as exposed to the model.
    fn name(&self) -> &str;
    /// Human-readable description for the model.
    fn description(&self) -> &str;
    /// JSON schema of the tool's parameters.
    fn schema(&self) -> serde_json::Value;
    /// Execute the tool.
    async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value>;
}

/// Registry of tools available to the executor.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, keyed by its name.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(Arc::clone)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tools in OpenAI function schema format.
    #[must_use]
    pub fn openai_tools_json(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|t| function_tool(t.name(), t.description(), t.schema()))
            .collect()
    }
}

/// Accumulated state for a streaming tool call.
#[derive(Debug, Default, Clone)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Agent executor: drives the tool loop and emits the trace as a stream.
#[derive(Clone)]
pub struct AgentExecutor {
    driver: Arc<dyn LlmDriver>,
    tools: Arc<ToolRegistry>,
}

impl std::fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("tool_count", &self.tools.len())
            .finish()
    }
}

impl AgentExecutor {
    /// Create an executor over the given driver and tool registry.
    #[must_use]
    pub fn new(driver: Arc<dyn LlmDriver>, tools: Arc<ToolRegistry>) -> Self {
        Self { driver, tools }
    }

    /// Run the agent over a prepared message history.
    ///
    /// Emits `stream.start` first, relays driver events as they arrive,
    /// emits a `tool_result` per executed call, and ends with `done`.
    /// Terminal failures are raised from the sequence itself.
    pub fn run(
        &self,
        messages: Vec<serde_json::Value>,
    ) -> impl Stream<Item = anyhow::Result<AgentEvent>> + Send + 'static {
        let executor = self.clone();
        let request_id = Uuid::new_v4().to_string();
        let tool_schemas = executor.tools.openai_tools_json();

        tracing::info!(
            request_id = %request_id,
            message_count = messages.len(),
            tool_count = tool_schemas.len(),
            "Starting agent run"
        );

        async_stream::try_stream! {
            yield AgentEvent::StreamStart {
                request_id: request_id.clone(),
            };

            let mut history = messages;

            for iteration in 1..=MAX_TOOL_ITERATIONS {
                tracing::debug!(
                    request_id = %request_id,
                    iteration = iteration,
                    message_count = history.len(),
                    "Tool loop iteration"
                );

                let req = LlmRequest {
                    messages: history.clone(),
                    tools: tool_schemas.clone(),
                    tool_choice: None,
                };

                let driver_stream = executor.driver.stream(req).await?;
                futures::pin_mut!(driver_stream);

                let mut accumulators: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
                let mut assistant_text = String::new();
                let mut has_tool_calls = false;

                while let Some(event) = driver_stream.next().await {
                    let event = event?;
                    match &event {
                        AgentEvent::MessageDelta { text } => {
                            assistant_text.push_str(text);
                        }
                        AgentEvent::ToolCallDelta {
                            call_index,
                            id,
                            name,
                            arguments_delta,
                        } => {
                            has_tool_calls = true;
                            let acc = accumulators.entry(*call_index).or_default();
                            if acc.id.is_none() {
                                acc.id.clone_from(id);
                            }
                            if acc.name.is_none() {
                                acc.name.clone_from(name);
                            }
                            if let Some(delta) = arguments_delta {
                                acc.arguments.push_str(delta);
                            }
                        }
                        AgentEvent::ToolCallComplete { .. } => {
                            has_tool_calls = true;
                        }
                        // The driver's done only closes this iteration; the
                        // run-level done is emitted below.
                        AgentEvent::Done => continue,
                        _ => {}
                    }
                    yield event;
                }

                if !has_tool_calls {
                    tracing::info!(
                        request_id = %request_id,
                        iteration = iteration,
                        "Final response produced, completing run"
                    );
                    yield AgentEvent::Done;
                    return;
                }

                // Assemble calls; fragments without an id and name are
                // unusable and dropped.
                let calls: Vec<(String, String, String)> = accumulators
                    .values()
                    .filter_map(|acc| {
                        Some((acc.id.clone()?, acc.name.clone()?, acc.arguments.clone()))
                    })
                    .collect();

                if calls.is_empty() {
                    tracing::warn!(
                        request_id = %request_id,
                        iteration = iteration,
                        "Tool call fragments never assembled, completing run"
                    );
                    yield AgentEvent::Done;
                    return;
                }

                history.push(serde_json::json!({
                    "role": "assistant",
                    "content": if assistant_text.is_empty() {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(assistant_text.clone())
                    },
                    "tool_calls": calls.iter().map(|(id, name, arguments)| {
                        serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": arguments }
                        })
                    }).collect::<Vec<_>>()
                }));

                for (id, name, arguments) in calls {
                    let args: serde_json::Value = serde_json::from_str(&arguments)
                        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));

                    tracing::info!(
                        request_id = %request_id,
                        iteration = iteration,
                        tool_id = %id,
                        tool_name = %name,
                        "Executing tool call"
                    );

                    let (content, success) = match executor.execute(&name, args).await {
                        Ok(result) => (
                            serde_json::to_string(&result).unwrap_or_default(),
                            true,
                        ),
                        Err(e) => {
                            tracing::error!(
                                request_id = %request_id,
                                tool_id = %id,
                                tool_name = %name,
                                error = %e,
                                "Tool call failed"
                            );
                            (format!("Error: {e}"), false)
                        }
                    };

                    yield AgentEvent::ToolResult {
                        id: id.clone(),
                        name: name.clone(),
                        content: content.clone(),
                        success,
                    };

                    history.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": id,
                        "content": content
                    }));
                }
            }

            tracing::error!(
                request_id = %request_id,
                max_iterations = MAX_TOOL_ITERATIONS,
                "Maximum tool loop iterations exceeded"
            );
            Err(anyhow::anyhow!("maximum tool loop iterations exceeded"))?;
        }
    }

    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown tool: {name}"))?;
        tool.call(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the arguments back."
        }
        fn schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, args: serde_json::Value) -> anyhow::Result<serde_json::Value> {
            Ok(args)
        }
    }

    #[test]
    fn test_registry_lookup_by_name() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_registry_openai_schema() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let tools = registry.openai_tools_json();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["function"]["name"], "echo");
        assert_eq!(tools[0]["type"], "function");
    }
}
