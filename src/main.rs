//! Axum Agent Chat server
//!
//! Entry point for the streaming chat demonstration service.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;

use axum_agent_chat::agent::{ToolRegistry, WebSearchTool};
use axum_agent_chat::config::{AppConfig, load_llm_settings};
use axum_agent_chat::llm::ChatCompletionsDriver;
use axum_agent_chat::{AppState, server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = match load_llm_settings() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        temperature = settings.temperature,
        "LLM configuration loaded"
    );

    let driver = Arc::new(ChatCompletionsDriver::new(settings));

    // Tools are optional: without a Tavily key the agent endpoint still
    // works, the model just has nothing to call.
    let mut tools = ToolRegistry::new();
    match std::env::var("TAVILY_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            tools = tools.with_tool(Arc::new(WebSearchTool::new(key)));
            info!(name: "agent.tool.registered", tool = "web_search", "Agent tool registered");
        }
        _ => {
            tracing::warn!("TAVILY_API_KEY not set, agent runs without web search");
        }
    }

    let state = AppState {
        driver,
        tools: Arc::new(tools),
        config: Arc::clone(&config),
    };

    server::start_server(&config, state).await
}
