//! Conversation state machine.
//!
//! Owns the transcript and the awaiting-reply flag. Submission appends the
//! user message optimistically before the network round-trip; completion
//! appends either the backend reply or the fixed fallback, and always
//! clears awaiting-reply last. At most one request is outstanding at a
//! time; further submissions are rejected with no state change.

use crate::chat::backend::ChatBackend;
use crate::chat::transcript::Transcript;
use crate::error::{EmpaError, Result};
use crate::sensor::messages::EmotionSnapshot;
use tracing::warn;

/// Assistant message appended when the exchange fails for any reason.
pub const FALLBACK_REPLY: &str = "Sorry, I lost connection to my brain. Please try again.";

/// Transcript plus in-flight state for the conversation.
#[derive(Debug)]
pub struct ConversationController {
    transcript: Transcript,
    awaiting_reply: bool,
}

impl Default for ConversationController {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationController {
    /// A controller with the transcript seeded with the greeting.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transcript: Transcript::with_greeting(),
            awaiting_reply: false,
        }
    }

    /// The conversation transcript.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether a request is currently in flight.
    #[must_use]
    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Whether a submission of `text` would be accepted right now.
    #[must_use]
    pub fn can_send(&self, text: &str) -> bool {
        !text.trim().is_empty() && !self.awaiting_reply
    }

    /// Validate a submission, append the user message, and mark the
    /// request as outstanding.
    ///
    /// # Errors
    ///
    /// Returns an error, with no state change, if the text is
    /// empty/whitespace or a request is already in flight.
    pub fn begin_send(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(EmpaError::Chat("message is empty".into()));
        }
        if self.awaiting_reply {
            return Err(EmpaError::Chat("a request is already in flight".into()));
        }

        self.transcript.push_user(text);
        self.awaiting_reply = true;
        Ok(())
    }

    /// Record the outcome of the in-flight request.
    ///
    /// A failure becomes the fixed fallback reply rather than propagating.
    /// Awaiting-reply is cleared last, whatever the outcome.
    pub fn complete(&mut self, outcome: Result<String>) {
        let reply = match outcome {
            Ok(text) => text,
            Err(e) => {
                warn!("chat exchange failed: {e}");
                FALLBACK_REPLY.to_owned()
            }
        };
        self.transcript.push_assistant(reply);
        self.awaiting_reply = false;
    }

    /// Full submission cycle against a backend: validate, append, post,
    /// and record the outcome.
    ///
    /// # Errors
    ///
    /// Only precondition violations error (empty text, request already
    /// outstanding); backend failures are absorbed into the fallback reply.
    pub async fn send_message(
        &mut self,
        backend: &ChatBackend,
        text: &str,
        snapshot: &EmotionSnapshot,
    ) -> Result<()> {
        self.begin_send(text)?;
        let outcome = backend.send(text, snapshot).await;
        self.complete(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::chat::transcript::Role;

    #[test]
    fn begin_send_appends_user_message_and_sets_awaiting() {
        let mut controller = ConversationController::new();
        let before = controller.transcript().len();

        controller.begin_send("hello").unwrap();

        assert_eq!(controller.transcript().len(), before + 1);
        let last = controller.transcript().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "hello");
        assert!(controller.awaiting_reply());
    }

    #[test]
    fn empty_submission_is_rejected_without_state_change() {
        let mut controller = ConversationController::new();
        let before = controller.transcript().len();

        assert!(controller.begin_send("").is_err());
        assert!(controller.begin_send("   \t").is_err());

        assert_eq!(controller.transcript().len(), before);
        assert!(!controller.awaiting_reply());
    }

    #[test]
    fn second_submission_while_awaiting_is_rejected() {
        let mut controller = ConversationController::new();
        controller.begin_send("first").unwrap();
        let before = controller.transcript().len();

        assert!(controller.begin_send("second").is_err());
        assert_eq!(controller.transcript().len(), before);
        assert!(controller.awaiting_reply());
    }

    #[test]
    fn success_outcome_appends_reply_and_clears_awaiting() {
        let mut controller = ConversationController::new();
        controller.begin_send("hi").unwrap();

        controller.complete(Ok("hello!".to_owned()));

        let last = controller.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "hello!");
        assert!(!controller.awaiting_reply());
    }

    #[test]
    fn failure_outcome_appends_fallback_and_clears_awaiting() {
        let mut controller = ConversationController::new();
        controller.begin_send("hi").unwrap();

        controller.complete(Err(EmpaError::Chat("boom".into())));

        let last = controller.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, FALLBACK_REPLY);
        assert!(!controller.awaiting_reply());
    }

    #[test]
    fn submission_appends_exactly_one_user_and_one_assistant_message() {
        let mut controller = ConversationController::new();
        let before = controller.transcript().len();

        controller.begin_send("question").unwrap();
        controller.complete(Ok("answer".to_owned()));

        assert_eq!(controller.transcript().len(), before + 2);
        assert!(controller.can_send("next"));
    }

    #[test]
    fn can_send_honours_both_preconditions() {
        let mut controller = ConversationController::new();
        assert!(controller.can_send("hello"));
        assert!(!controller.can_send("  "));

        controller.begin_send("hello").unwrap();
        assert!(!controller.can_send("more"));
    }
}
