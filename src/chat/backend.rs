//! HTTP client for the chat backend.
//!
//! One request/response exchange per user turn: POST the message plus the
//! latest emotion context, expect `{"response": "..."}` back. Anything
//! else (connection failure, non-2xx status, a body that doesn't parse)
//! is a typed error the controller maps to the fallback reply. No retry,
//! no timeout, no cancellation.

use crate::error::{EmpaError, Result};
use crate::sensor::messages::EmotionSnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Text-sentiment slot in the emotion context. Upstream placeholder for an
/// unimplemented analysis channel; sent verbatim on every request.
const TEXT_SENTIMENT_PLACEHOLDER: &str = "neutral";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    emotion_context: EmotionContext<'a>,
}

#[derive(Serialize)]
struct EmotionContext<'a> {
    face: &'a str,
    voice: &'a str,
    text: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

/// Chat backend reachable over HTTP.
#[derive(Debug, Clone)]
pub struct ChatBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl ChatBackend {
    /// Create a client for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// The endpoint this client posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one message with the given emotion context and return the
    /// assistant reply text.
    ///
    /// # Errors
    ///
    /// Returns an error on connection failure, a non-2xx status, or a
    /// response body without a string `response` field.
    pub async fn send(&self, message: &str, snapshot: &EmotionSnapshot) -> Result<String> {
        let body = ChatRequest {
            message,
            emotion_context: EmotionContext {
                face: snapshot.expression.as_str(),
                voice: snapshot.voice.as_str(),
                text: TEXT_SENTIMENT_PLACEHOLDER,
            },
        };

        debug!(
            "posting chat message ({} chars, face={}, voice={})",
            message.len(),
            snapshot.expression,
            snapshot.voice
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmpaError::Chat(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmpaError::Chat(format!(
                "chat request failed with status {status}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EmpaError::Chat(format!("malformed chat response: {e}")))?;

        Ok(parsed.response)
    }
}
