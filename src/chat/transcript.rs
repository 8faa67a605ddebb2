//! Conversation transcript storage.
//!
//! An append-only, in-memory list of messages; nothing persists across
//! process restarts by design.

use chrono::{DateTime, Utc};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Greeting the transcript is seeded with on startup.
pub const GREETING: &str = "Hello! I'm EmpaAI. I'm actively analyzing your expressions and voice \
to understand you better. How can I help?";

/// Ordered, append-only message list.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// An empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript seeded with the assistant greeting.
    #[must_use]
    pub fn with_greeting() -> Self {
        let mut transcript = Self::new();
        transcript.push_assistant(GREETING);
        transcript
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    /// Append an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into());
    }

    fn push(&mut self, role: Role, content: String) {
        self.messages.push(ChatMessage {
            role,
            content,
            timestamp: Utc::now(),
        });
    }

    /// All messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The most recent message, if any.
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn seeded_transcript_starts_with_greeting() {
        let transcript = Transcript::with_greeting();
        assert_eq!(transcript.len(), 1);
        let first = transcript.last().unwrap();
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.content, GREETING);
    }

    #[test]
    fn messages_keep_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello");
        transcript.push_assistant("hi there");
        transcript.push_user("how are you");

        let messages = transcript.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].content, "how are you");
    }

    #[test]
    fn role_labels() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
