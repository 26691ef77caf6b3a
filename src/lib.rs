//! Axum Agent Chat
//!
//! A demonstration chat service that connects a browser chat UI to a hosted
//! LLM provider, forwarding streamed tokens and tool-call events back to the
//! client over incremental HTTP responses.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with streamed response bodies
//! - **Stream Bridge**: pull-driven adapter from event sequences to byte
//!   streams, one event at a time
//! - **LLM layer**: streaming Chat Completions driver behind a trait
//! - **Agent**: tool loop over the driver with in-process tools
//!
//! # Modules
//!
//! - [`messages`]: inbound chat-turn normalization
//! - [`events`]: streaming event model and outbound envelopes
//! - [`bridge`]: event-stream to byte-stream bridging
//! - [`llm`]: driver trait and implementations
//! - [`agent`]: tool registry and executor

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod agent;
pub mod bridge;
pub mod config;
pub mod events;
pub mod llm;
pub mod messages;
pub mod server;
pub mod telemetry;

use std::sync::Arc;

use crate::agent::ToolRegistry;
use crate::config::AppConfig;
use crate::llm::LlmDriver;

/// Application state shared across all handlers.
///
/// Immutable per process; each request owns its own event sequence and
/// output stream, so nothing here is mutated concurrently.
#[derive(Clone)]
pub struct AppState {
    /// Streaming LLM driver.
    pub driver: Arc<dyn LlmDriver>,
    /// Tools available to the agent endpoint.
    pub tools: Arc<ToolRegistry>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("tool_count", &self.tools.len())
            .field("config", &self.config)
            .finish()
    }
}
