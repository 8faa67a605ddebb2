//! Configuration types for the emotion-aware chat stack.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the configured chat endpoint.
pub const CHAT_URL_ENV: &str = "EMPA_CHAT_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmpaConfig {
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// Video frame feed and expression detector settings.
    pub vision: VisionConfig,
    /// Sensor polling and spectrum analysis settings.
    pub sensor: SensorConfig,
    /// Chat backend settings.
    pub chat: ChatConfig,
    /// Voice dictation settings.
    pub dictation: DictationConfig,
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate in Hz after downsampling.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
        }
    }
}

/// Video frame feed and expression detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Directory holding the face detector and expression net ONNX assets.
    pub model_dir: PathBuf,
    /// HuggingFace repo the fetch tool pulls missing assets from.
    pub model_repo: String,
    /// Minimum detector score for a region to count as a face.
    pub score_threshold: f32,
    /// Square input size the detector network expects, in pixels.
    pub detector_input: u32,
    /// Snapshot file the frame source polls for the latest camera frame.
    ///
    /// An external grabber keeps this JPEG/PNG current. When `None`, no
    /// frames arrive and the facial channel stays at the neutral fallback.
    pub frame_path: Option<PathBuf>,
    /// How often the snapshot file is re-read, in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_repo: "empa-ai/face-expression-onnx".to_owned(),
            score_threshold: 0.5,
            detector_input: 320,
            frame_path: None,
            frame_interval_ms: 100,
        }
    }
}

/// Sensor polling and spectrum analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Interval between facial detection passes, in milliseconds.
    pub detect_interval_ms: u64,
    /// Interval between merged snapshot emissions, in milliseconds.
    pub emit_interval_ms: u64,
    /// FFT size for the spectrum analyser (must be a power of two).
    pub fft_size: usize,
    /// Exponential smoothing constant for spectrum magnitudes (0–1).
    pub smoothing: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            detect_interval_ms: 500,
            emit_interval_ms: 500,
            fft_size: 1024,
            smoothing: 0.8,
        }
    }
}

/// Chat backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat endpoint URL the controller posts messages to.
    pub endpoint: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/chat".to_owned(),
        }
    }
}

impl ChatConfig {
    /// The endpoint to use, honouring the [`CHAT_URL_ENV`] override.
    pub fn effective_endpoint(&self) -> String {
        match std::env::var(CHAT_URL_ENV) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => self.endpoint.clone(),
        }
    }
}

/// Voice dictation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Whether the dictation feature is offered at all.
    pub enabled: bool,
    /// HuggingFace model ID for the speech-to-text model.
    pub model_id: String,
    /// RMS energy threshold for speech detection.
    pub threshold: f32,
    /// Minimum silence duration in ms to close a speech segment.
    pub min_silence_duration_ms: u32,
    /// Minimum speech duration in ms to consider a segment valid.
    pub min_speech_duration_ms: u32,
    /// Samples of new speech required before refreshing the interim text.
    pub interim_chunk_samples: usize,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // ONNX conversion repo; the upstream NVIDIA repo only ships .nemo format.
            model_id: "istupakov/parakeet-tdt-0.6b-v3-onnx".to_owned(),
            threshold: 0.01,
            min_silence_duration_ms: 800,
            min_speech_duration_ms: 300,
            interim_chunk_samples: 16_000,
        }
    }
}

impl EmpaConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::EmpaError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::EmpaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/empa/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("empa").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("empa")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/empa-config/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EmpaConfig::default();
        assert!(config.audio.input_sample_rate > 0);
        assert!(config.sensor.emit_interval_ms > 0);
        assert!(config.sensor.detect_interval_ms > 0);
        assert!(config.sensor.fft_size.is_power_of_two());
        assert!((0.0..=1.0).contains(&config.sensor.smoothing));
        assert!(!config.chat.endpoint.is_empty());
        assert!(!config.dictation.model_id.is_empty());
        assert!(config.vision.score_threshold > 0.0);
        assert!(config.vision.detector_input > 0);
    }

    #[test]
    fn default_emission_interval_is_500ms() {
        let config = SensorConfig::default();
        assert_eq!(config.emit_interval_ms, 500);
        assert_eq!(config.detect_interval_ms, 500);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("empa-test-config-roundtrip");
        let path = dir.join("config.toml");

        let mut config = EmpaConfig::default();
        config.audio.input_sample_rate = 44_100;
        config.chat.endpoint = "http://example.com/chat".to_owned();
        config.sensor.emit_interval_ms = 250;

        assert!(config.save_to_file(&path).is_ok());
        assert!(path.exists());

        let loaded = EmpaConfig::from_file(&path);
        assert!(loaded.is_ok());
        let loaded = match loaded {
            Ok(c) => c,
            Err(_) => unreachable!("load should succeed"),
        };
        assert_eq!(loaded.audio.input_sample_rate, 44_100);
        assert_eq!(loaded.chat.endpoint, "http://example.com/chat");
        assert_eq!(loaded.sensor.emit_interval_ms, 250);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = EmpaConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("empa-test-config-invalid");
        let path = dir.join("bad.toml");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(&path, "this is not valid toml {{{").ok();

        let result = EmpaConfig::from_file(&path);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = EmpaConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("empa"));
    }

    #[test]
    fn partial_toml_uses_defaults_for_missing_sections() {
        let config: EmpaConfig = toml::from_str("[chat]\nendpoint = \"http://host:9/chat\"").unwrap();
        assert_eq!(config.chat.endpoint, "http://host:9/chat");
        assert_eq!(config.sensor.emit_interval_ms, 500);
        assert_eq!(config.audio.input_sample_rate, 16_000);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = EmpaConfig::default();
        let result = toml::to_string_pretty(&config);
        assert!(result.is_ok());
        let toml_str = match result {
            Ok(s) => s,
            Err(_) => unreachable!("serialization should succeed"),
        };
        assert!(toml_str.contains("input_sample_rate"));
        assert!(toml_str.contains("emit_interval_ms"));
        assert!(toml_str.contains("endpoint"));
    }
}
