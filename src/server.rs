//! HTTP surface: router and streaming chat handlers.
//!
//! Three POST endpoints accept the same `{ messages: [...] }` body and
//! differ only in what flows back:
//!
//! - `/api/chat` streams raw text deltas (`text/plain`)
//! - `/api/chat/tools` streams structured tool outputs wrapped in synthetic
//!   tool messages, one JSON frame per line (`application/x-ndjson`)
//! - `/api/agent` streams the full agent trace as SSE (`text/event-stream`)
//!
//! Validation failures are rejected before any stream is created. Once a
//! stream is open, an upstream failure simply ends the body early — bytes
//! already flushed are not retracted.

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::AppState;
use crate::agent::AgentExecutor;
use crate::bridge;
use crate::config::AppConfig;
use crate::events::AgentEvent;
use crate::llm::structured::force_tool_choice;
use crate::llm::{LlmRequest, Message, function_tool, structured_stream};
use crate::messages::{ChatTurn, normalize};

const CHAT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Given the question, respond to the best of your abilities.";

const TOOLS_SYSTEM_PROMPT: &str = "You are a helpful assistant. Given the question, use the \
    'profanity' tool to determine if the message contains profanity.";

const AGENT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the available tools to answer the user's question.";

/// Request body shared by all chat endpoints.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Ordered conversation turns.
    pub messages: Vec<ChatTurn>,
}

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/chat/tools", post(api_chat_tools))
        .route("/api/agent", post(api_agent))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server with the provided configuration and state.
pub async fn start_server(config: &AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Assemble the provider message list: fixed system prompt, conversation
/// history, then the latest turn's content as the user input.
fn prompt_messages(system_prompt: &str, mut history: Vec<Message>) -> Vec<serde_json::Value> {
    let input = history.pop();

    let mut out = vec![serde_json::json!({
        "role": "system",
        "content": system_prompt,
    })];
    out.extend(
        history
            .iter()
            .map(|m| serde_json::to_value(m).unwrap_or_default()),
    );
    if let Some(last) = input {
        out.push(serde_json::json!({
            "role": "user",
            "content": last.content,
        }));
    }
    out
}

/// POST /api/chat — stream raw text deltas.
async fn api_chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let history = match normalize(&req.messages) {
        Ok(h) => h,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    info!(
        name: "chat.request",
        message_count = history.len(),
        "Received chat request"
    );

    let llm_req = LlmRequest {
        messages: prompt_messages(CHAT_SYSTEM_PROMPT, history),
        tools: vec![],
        tool_choice: None,
    };

    let events = match state.driver.stream(llm_req).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start model stream");
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    // Reduce the event stream to bare text fragments.
    let fragments = async_stream::try_stream! {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match event? {
                AgentEvent::MessageDelta { text } => yield text,
                AgentEvent::Error { message, .. } => {
                    Err(anyhow::anyhow!(message))?;
                }
                AgentEvent::Done => break,
                _ => {}
            }
        }
    };

    let (frames, _handle) = bridge::spawn(fragments, bridge::text_frame);

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(frames),
    )
        .into_response()
}

/// POST /api/chat/tools — stream structured tool outputs as JSON frames.
async fn api_chat_tools(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let history = match normalize(&req.messages) {
        Ok(h) => h,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    info!(
        name: "chat.tools.request",
        message_count = history.len(),
        "Received structured chat request"
    );

    let llm_req = LlmRequest {
        messages: prompt_messages(TOOLS_SYSTEM_PROMPT, history),
        tools: vec![function_tool(
            "profanity",
            "Determine whether the message contains profanity.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "contains_profanity": {
                        "type": "boolean",
                        "description": "Whether the message contains profanity"
                    }
                },
                "required": ["contains_profanity"]
            }),
        )],
        tool_choice: Some(force_tool_choice("profanity")),
    };

    let events = match state.driver.stream(llm_req).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start model stream");
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    // Each structured output becomes one synthetic tool-message envelope.
    let envelopes = structured_stream(events).map(|item| {
        item.and_then(|output| {
            crate::events::ToolMessage::wrap("profanity", &output).map_err(Into::into)
        })
    });

    let (frames, _handle) = bridge::spawn(envelopes, bridge::json_frame);

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(frames),
    )
        .into_response()
}

/// POST /api/agent — stream the agent trace as SSE.
async fn api_agent(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let history = match normalize(&req.messages) {
        Ok(h) => h,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    info!(
        name: "agent.request",
        message_count = history.len(),
        tool_count = state.tools.len(),
        "Received agent request"
    );

    let executor = AgentExecutor::new(std::sync::Arc::clone(&state.driver), std::sync::Arc::clone(&state.tools));
    let events = executor.run(prompt_messages(AGENT_SYSTEM_PROMPT, history));

    let (frames, _handle) = bridge::spawn(events, bridge::sse_frame);

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// GET /health — liveness probe.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    fn msg(role: MessageRole, content: &str) -> Message {
        Message {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_prompt_messages_splits_history_and_input() {
        let history = vec![
            msg(MessageRole::User, "earlier question"),
            msg(MessageRole::Assistant, "earlier answer"),
            msg(MessageRole::User, "current question"),
        ];
        let out = prompt_messages("sys", history);

        assert_eq!(out.len(), 4);
        assert_eq!(out[0]["role"], "system");
        assert_eq!(out[0]["content"], "sys");
        assert_eq!(out[1]["content"], "earlier question");
        assert_eq!(out[2]["role"], "assistant");
        // The latest turn is always presented as the user input.
        assert_eq!(out[3]["role"], "user");
        assert_eq!(out[3]["content"], "current question");
    }

    #[test]
    fn test_prompt_messages_with_empty_history() {
        let out = prompt_messages("sys", vec![]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["role"], "system");
    }
}
