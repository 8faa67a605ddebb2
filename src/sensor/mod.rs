//! Sensor capture: camera expression polling, microphone volume banding,
//! and the merged emotion snapshot stream.

pub mod frames;
pub mod hub;
pub mod level;
pub mod messages;
pub mod vision;

pub use hub::{SensorHandles, SensorHub, SensorStatus};
pub use messages::{AudioChunk, EmotionSnapshot, VideoFrame, VocalBand};
