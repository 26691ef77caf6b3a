use axum_agent_chat::config::{AppConfig, load_llm_settings};
use serial_test::serial;
use std::env;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("APP_SERVER__PORT");
        env::remove_var("APP_SERVER__HOST");
        env::remove_var("PORT");
        env::remove_var("HOST");
        env::remove_var("LLM_BASE_URL");
        env::remove_var("LLM_MODEL");
        env::remove_var("LLM_API_KEY");
        env::remove_var("LLM_TEMPERATURE");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(["axum-agent-chat"]).expect("Failed to load config");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("APP_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args(["axum-agent-chat"]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_flag_wins_over_env() {
    clear_env_vars();
    unsafe {
        env::set_var("APP_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args(["axum-agent-chat", "--port", "7070"])
        .expect("Failed to load config");
    assert_eq!(config.server.port, 7070);

    clear_env_vars();
}

#[test]
#[serial]
fn test_llm_settings_require_base_url() {
    clear_env_vars();

    let err = load_llm_settings().unwrap_err();
    assert!(err.contains("LLM_BASE_URL"));
}

#[test]
#[serial]
fn test_llm_settings_require_model() {
    clear_env_vars();
    unsafe {
        env::set_var("LLM_BASE_URL", "https://api.openai.com");
    }

    let err = load_llm_settings().unwrap_err();
    assert!(err.contains("LLM_MODEL"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_llm_settings_loaded_from_env() {
    clear_env_vars();
    unsafe {
        env::set_var("LLM_BASE_URL", "https://api.openai.com");
        env::set_var("LLM_MODEL", "gpt-4-turbo");
        env::set_var("LLM_API_KEY", "sk-test");
        env::set_var("LLM_TEMPERATURE", "0.2");
    }

    let settings = load_llm_settings().expect("Failed to load settings");
    assert_eq!(settings.base_url, "https://api.openai.com");
    assert_eq!(settings.model, "gpt-4-turbo");
    assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
    assert!((settings.temperature - 0.2).abs() < f32::EPSILON);

    clear_env_vars();
}

#[test]
#[serial]
fn test_llm_temperature_must_parse() {
    clear_env_vars();
    unsafe {
        env::set_var("LLM_BASE_URL", "https://api.openai.com");
        env::set_var("LLM_MODEL", "gpt-4-turbo");
        env::set_var("LLM_TEMPERATURE", "warm");
    }

    let err = load_llm_settings().unwrap_err();
    assert!(err.contains("LLM_TEMPERATURE"));

    clear_env_vars();
}
