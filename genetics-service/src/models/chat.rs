//! Chat transcript model and the chatbot wire types.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use validator::Validate;

/// Maximum number of turns retained per session and forwarded to the model.
pub const HISTORY_WINDOW: usize = 10;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chronological list of turns belonging to one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: VecDeque<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `turn`, then drop the oldest turns until at most `window` remain.
    pub fn push_trimmed(&mut self, turn: Turn, window: usize) {
        self.turns.push_back(turn);
        while self.turns.len() > window {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::collections::vec_deque::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Body of `POST /api/chatbot`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(
        required(message = "No message provided"),
        length(min = 1, message = "No message provided")
    )]
    pub message: Option<String>,

    #[validate(length(max = 128, message = "Invalid session_id"))]
    pub session_id: Option<String>,
}

/// Successful chatbot response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleven_turns_drop_the_first() {
        let mut transcript = Transcript::new();
        for i in 1..=11 {
            transcript.push_trimmed(Turn::user(format!("turn {i}")), HISTORY_WINDOW);
        }

        assert_eq!(transcript.len(), HISTORY_WINDOW);
        let contents: Vec<_> = transcript.iter().map(|t| t.content.as_str()).collect();
        let expected: Vec<String> = (2..=11).map(|i| format!("turn {i}")).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn window_never_exceeded() {
        let mut transcript = Transcript::new();
        for i in 0..37 {
            let turn = if i % 2 == 0 {
                Turn::user(i.to_string())
            } else {
                Turn::assistant(i.to_string())
            };
            transcript.push_trimmed(turn, HISTORY_WINDOW);
            assert!(transcript.len() <= HISTORY_WINDOW);
        }
        assert_eq!(transcript.last().unwrap().content, "36");
    }

    #[test]
    fn turns_serialize_with_lowercase_roles() {
        let mut transcript = Transcript::new();
        transcript.push_trimmed(Turn::user("hi"), HISTORY_WINDOW);
        transcript.push_trimmed(Turn::assistant("hello"), HISTORY_WINDOW);

        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ])
        );
    }

    #[test]
    fn empty_message_fails_validation() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": ""}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("message"));

        let request: ChatRequest = serde_json::from_str(r#"{"session_id": "abc"}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn oversized_session_id_fails_validation() {
        let request = ChatRequest {
            message: Some("hi".to_string()),
            session_id: Some("x".repeat(200)),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("session_id"));
        assert!(!errors.field_errors().contains_key("message"));
    }
}
