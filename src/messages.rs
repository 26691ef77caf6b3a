//! Inbound chat-turn normalization.
//!
//! Converts the client's ordered `{ role, content }` turns into the
//! [`Message`] representation consumed by the LLM invocation layer. The
//! mapping is pure, synchronous, and 1:1 — order and content are preserved
//! verbatim. The role set is closed: anything outside `user`, `system`, and
//! `assistant` is a hard validation failure, not a silent default.

use serde::Deserialize;
use thiserror::Error;

use crate::llm::{Message, MessageRole};

/// A single role-tagged turn as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    /// Author role: `user`, `system`, or `assistant`.
    pub role: String,
    /// Text content of the turn.
    pub content: String,
}

/// A turn carried a role outside the supported set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported role `{role}` at message index {index}")]
pub struct UnsupportedRoleError {
    /// Zero-based index of the offending turn.
    pub index: usize,
    /// The role string as received.
    pub role: String,
}

/// Map client turns into invocation-layer messages.
///
/// Fails on the first turn whose role is not in the supported set; no
/// partial output is produced.
pub fn normalize(turns: &[ChatTurn]) -> Result<Vec<Message>, UnsupportedRoleError> {
    turns
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            let role = match turn.role.as_str() {
                "user" => MessageRole::User,
                "system" => MessageRole::System,
                "assistant" => MessageRole::Assistant,
                other => {
                    return Err(UnsupportedRoleError {
                        index,
                        role: other.to_string(),
                    });
                }
            };
            Ok(Message {
                role,
                content: turn.content.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_roles_and_content_preserved_positionally() {
        let turns = vec![
            turn("system", "be terse"),
            turn("user", "Hi"),
            turn("assistant", "Hello!"),
        ];
        let messages = normalize(&turns).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "be terse");
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "Hi");
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[2].content, "Hello!");
    }

    #[test]
    fn test_tool_role_rejected_at_index_zero() {
        let err = normalize(&[turn("tool", "x")]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.role, "tool");
        assert!(err.to_string().contains("index 0"));
    }

    #[test]
    fn test_error_reports_offending_index() {
        let turns = vec![turn("user", "a"), turn("assistant", "b"), turn("robot", "c")];
        let err = normalize(&turns).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.role, "robot");
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(normalize(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let turns = vec![turn("user", "same input"), turn("assistant", "same output")];
        let first = serde_json::to_vec(&normalize(&turns).unwrap()).unwrap();
        let second = serde_json::to_vec(&normalize(&turns).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
