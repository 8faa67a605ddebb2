//! Voice dictation: speech-to-text feeding the compose input.
//!
//! The shell depends only on the [`SpeechRecognizer`] capability
//! interface; the shipped adapter segments the shared microphone stream by
//! energy and transcribes with Parakeet TDT. Interim results update the
//! input live, segment closures finalize into the accumulated session
//! text, and submission stays manual.

use crate::config::DictationConfig;
use crate::error::{EmpaError, Result};
use crate::sensor::messages::AudioChunk;
use async_trait::async_trait;
use parakeet_rs::{ParakeetTDT, TimestampMode, Transcriber};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Recognition output delivered to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The session transcript so far. `is_final` marks a closed segment;
    /// interim updates replace the previous text.
    Transcript { text: String, is_final: bool },
    /// Recognition failed; the session ends after this event.
    Error(String),
}

/// Speech recognizer capability contract.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Stable recognizer identifier (e.g. `parakeet`).
    fn id(&self) -> &'static str;

    /// Consume audio and deliver recognition events until cancelled.
    async fn run(
        &self,
        audio: broadcast::Receiver<AudioChunk>,
        events: mpsc::Sender<RecognitionEvent>,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Parakeet TDT recognizer over the shared microphone stream.
pub struct ParakeetRecognizer {
    config: DictationConfig,
}

impl ParakeetRecognizer {
    pub fn new(config: &DictationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Resolve the model snapshot directory via hf-hub, downloading on
    /// first use.
    fn resolve_model_dir(&self) -> Result<std::path::PathBuf> {
        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| EmpaError::Dictation(format!("failed to create HF API: {e}")))?;
        let repo = api.model(self.config.model_id.clone());
        let info = repo.info().map_err(|e| {
            EmpaError::Dictation(format!(
                "failed to get repo info for {}: {e}",
                self.config.model_id
            ))
        })?;

        // hf-hub stores files under a snapshot directory; resolving any
        // file and taking its parent lands us there.
        if let Some(sibling) = info.siblings.first() {
            let path = repo.get(&sibling.rfilename).map_err(|e| {
                EmpaError::Dictation(format!("failed to download {}: {e}", sibling.rfilename))
            })?;
            if let Some(parent) = path.parent() {
                return Ok(parent.to_path_buf());
            }
        }

        Err(EmpaError::Dictation(format!(
            "could not determine model directory for {}",
            self.config.model_id
        )))
    }
}

#[async_trait]
impl SpeechRecognizer for ParakeetRecognizer {
    fn id(&self) -> &'static str {
        "parakeet"
    }

    async fn run(
        &self,
        mut audio: broadcast::Receiver<AudioChunk>,
        events: mpsc::Sender<RecognitionEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        info!("loading dictation model: {}", self.config.model_id);
        let load_result = tokio::task::block_in_place(|| {
            let dir = self.resolve_model_dir()?;
            ParakeetTDT::from_pretrained(&dir, None)
                .map_err(|e| EmpaError::Dictation(format!("failed to load Parakeet TDT: {e}")))
        });

        let mut model = match load_result {
            Ok(model) => model,
            Err(e) => {
                let _ = events
                    .send(RecognitionEvent::Error(e.to_string()))
                    .await;
                return Err(e);
            }
        };
        info!("dictation session started");

        let mut segmenter = EnergySegmenter::new(&self.config);
        let mut session_text = String::new();
        let mut decoded_len = 0usize;

        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => break,
                received = audio.recv() => match received {
                    Ok(chunk) => chunk,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("dictation lagged, skipped {skipped} chunks");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let sample_rate = chunk.sample_rate;

            if let Some(segment) = segmenter.push(&chunk) {
                // Segment closed: transcribe it and fold into the session.
                decoded_len = 0;
                match transcribe(&mut model, segment, sample_rate) {
                    Ok(text) if !text.trim().is_empty() => {
                        if !session_text.is_empty() {
                            session_text.push(' ');
                        }
                        session_text.push_str(text.trim());
                        let event = RecognitionEvent::Transcript {
                            text: session_text.clone(),
                            is_final: true,
                        };
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("segment transcription failed: {e}");
                        let _ = events.send(RecognitionEvent::Error(e.to_string())).await;
                        return Err(e);
                    }
                }
            } else if segmenter.in_speech()
                && segmenter.buffered() >= decoded_len + self.config.interim_chunk_samples
            {
                // Enough new speech since the last decode: refresh interim.
                decoded_len = segmenter.buffered();
                let partial = segmenter.buffer().to_vec();
                if let Ok(text) = transcribe(&mut model, partial, sample_rate) {
                    let mut interim = session_text.clone();
                    if !interim.is_empty() && !text.trim().is_empty() {
                        interim.push(' ');
                    }
                    interim.push_str(text.trim());
                    let event = RecognitionEvent::Transcript {
                        text: interim,
                        is_final: false,
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!("dictation session stopped");
        Ok(())
    }
}

/// Transcribe a buffer of mono samples.
fn transcribe(model: &mut ParakeetTDT, samples: Vec<f32>, sample_rate: u32) -> Result<String> {
    tokio::task::block_in_place(|| {
        model
            .transcribe_samples(samples, sample_rate, 1, Some(TimestampMode::Sentences))
            .map(|result| result.text)
            .map_err(|e| EmpaError::Dictation(format!("transcription failed: {e}")))
    })
}

/// Energy-threshold speech segmenter.
///
/// Buffers samples while speech is active and closes the segment after the
/// configured stretch of silence. Segments shorter than the minimum speech
/// duration are discarded.
struct EnergySegmenter {
    threshold: f32,
    min_silence_samples: usize,
    min_speech_samples: usize,
    buffer: Vec<f32>,
    silent_samples: usize,
    in_speech: bool,
}

impl EnergySegmenter {
    fn new(config: &DictationConfig) -> Self {
        let rate = 16_000usize;
        Self {
            threshold: config.threshold,
            min_silence_samples: config.min_silence_duration_ms as usize * rate / 1000,
            min_speech_samples: config.min_speech_duration_ms as usize * rate / 1000,
            buffer: Vec::new(),
            silent_samples: 0,
            in_speech: false,
        }
    }

    fn in_speech(&self) -> bool {
        self.in_speech
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    /// Feed one chunk; returns a completed speech segment when one closes.
    fn push(&mut self, chunk: &AudioChunk) -> Option<Vec<f32>> {
        let energy = rms_energy(&chunk.samples);
        let is_speech = energy > self.threshold;

        if is_speech {
            if !self.in_speech {
                self.in_speech = true;
                self.buffer.clear();
            }
            self.silent_samples = 0;
            self.buffer.extend_from_slice(&chunk.samples);
            return None;
        }

        if !self.in_speech {
            return None;
        }

        // Silence inside an open segment: keep it until the close threshold.
        self.silent_samples += chunk.samples.len();
        self.buffer.extend_from_slice(&chunk.samples);

        if self.silent_samples < self.min_silence_samples {
            return None;
        }

        self.in_speech = false;
        self.silent_samples = 0;
        if self.buffer.len() >= self.min_speech_samples {
            Some(std::mem::take(&mut self.buffer))
        } else {
            self.buffer.clear();
            None
        }
    }
}

/// RMS energy of audio samples.
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Owns the at-most-one active dictation session.
pub struct DictationController {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    audio: broadcast::Sender<AudioChunk>,
    session: Option<Session>,
}

struct Session {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl DictationController {
    /// `recognizer: None` means the capability is unavailable; toggling
    /// then returns a user-facing error and nothing else changes.
    pub fn new(
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        audio: broadcast::Sender<AudioChunk>,
    ) -> Self {
        Self {
            recognizer,
            audio,
            session: None,
        }
    }

    /// Whether a session is currently running.
    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    /// Start a session if none is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the recognizer capability is unavailable.
    pub fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<()> {
        let Some(ref recognizer) = self.recognizer else {
            return Err(EmpaError::Dictation(
                "speech recognition is not available".into(),
            ));
        };
        if self.is_active() {
            return Ok(());
        }
        // A finished session may still be parked here; replace it.
        self.session = None;

        let cancel = CancellationToken::new();
        let rx = self.audio.subscribe();
        let recognizer = Arc::clone(recognizer);
        let session_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = recognizer.run(rx, events, session_cancel).await {
                warn!("dictation session ended with error: {e}");
            }
        });

        self.session = Some(Session { cancel, task });
        Ok(())
    }

    /// Stop the active session, waiting for it to wind down.
    pub async fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            let _ = session.task.await;
        }
    }

    /// Toggle the session and return whether one is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the recognizer capability is unavailable.
    pub async fn toggle(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<bool> {
        if self.is_active() {
            self.stop().await;
            Ok(false)
        } else {
            self.start(events)?;
            Ok(true)
        }
    }
}
