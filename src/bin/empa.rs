//! Terminal dashboard binary.
//!
//! Tracing goes to a rolling log file; the terminal itself belongs to the
//! dashboard.

use empa::EmpaConfig;
use empa::chat::ChatBackend;
use empa::dictation::{DictationController, ParakeetRecognizer, SpeechRecognizer};
use empa::sensor::SensorHub;
use empa::ui::App;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = log_directory();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "empa.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("empa=info,hf_hub=warn,ort=warn")),
        )
        .init();

    let config = load_config()?;
    tracing::info!("empa starting (chat endpoint: {})", config.chat.effective_endpoint());

    let cancel = CancellationToken::new();
    let sensors = SensorHub::launch(&config, cancel.clone());

    let recognizer = config
        .dictation
        .enabled
        .then(|| Arc::new(ParakeetRecognizer::new(&config.dictation)) as Arc<dyn SpeechRecognizer>);
    let dictation = DictationController::new(recognizer, sensors.audio.clone());

    let backend = ChatBackend::new(config.chat.effective_endpoint());
    let mut app = App::new(backend, &sensors, dictation);

    let result = empa::ui::run(&mut app).await;
    cancel.cancel();

    result.map_err(|e| anyhow::anyhow!("dashboard failed: {e}"))?;
    tracing::info!("empa shut down cleanly");
    Ok(())
}

/// Load config from the CLI argument, the default path, or defaults.
fn load_config() -> anyhow::Result<EmpaConfig> {
    if let Some(path) = std::env::args().nth(1) {
        return EmpaConfig::from_file(Path::new(&path))
            .map_err(|e| anyhow::anyhow!("failed to load {path}: {e}"));
    }

    let default_path = EmpaConfig::default_config_path();
    if default_path.exists() {
        EmpaConfig::from_file(&default_path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", default_path.display()))
    } else {
        Ok(EmpaConfig::default())
    }
}

/// Directory for rolling log files.
fn log_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("empa")
        .join("logs")
}
