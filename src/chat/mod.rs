//! Conversation controller and chat backend client.

pub mod backend;
pub mod controller;
pub mod transcript;

pub use backend::ChatBackend;
pub use controller::{ConversationController, FALLBACK_REPLY};
pub use transcript::{ChatMessage, Role, Transcript};
