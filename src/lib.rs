//! Empa: emotion-aware AI chat companion.
//!
//! Layers live facial-expression inference and microphone volume banding
//! on top of a chat interface, forwarding the detected affect state as
//! contextual metadata to a remote chat backend.
//!
//! # Architecture
//!
//! Independent sensor stages connected by channels, merged into a single
//! observable snapshot stream:
//! - **Audio capture**: records from the microphone via `cpal` and fans
//!   chunks out to the volume analyser and any active dictation session
//! - **Volume banding**: classifies spectrum energy into four coarse bands
//! - **Expression detection**: polls the latest camera frame through an
//!   ONNX face/expression pass
//! - **Sensor hub**: merges the latest facial and vocal values every
//!   emission tick and publishes an [`sensor::EmotionSnapshot`]
//! - **Conversation controller**: one HTTP exchange per user turn, with
//!   the snapshot attached as `emotion_context`
//! - **Dashboard**: a `ratatui` shell with optional voice dictation

pub mod audio;
pub mod chat;
pub mod config;
pub mod dictation;
pub mod error;
pub mod face;
pub mod models;
pub mod sensor;
pub mod spectrum;
pub mod ui;

pub use chat::{ChatBackend, ConversationController};
pub use config::EmpaConfig;
pub use error::{EmpaError, Result};
pub use sensor::{EmotionSnapshot, SensorHub};
