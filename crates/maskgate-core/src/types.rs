//! Wire types shared between the dispatch layer and the redaction path

use serde::{Deserialize, Serialize};

/// A chat message in a conversational payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Whether this message carries caller-authored content subject to redaction
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_check() {
        assert!(ChatMessage::new("user", "hi").is_user());
        assert!(!ChatMessage::new("system", "hi").is_user());
        assert!(!ChatMessage::new("assistant", "hi").is_user());
    }

    #[test]
    fn test_serde_round_trip() {
        let msg = ChatMessage::new("user", "hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }
}
