//! Sensor hub: wires capture, analysis, and the snapshot emitter.
//!
//! The facial and vocal channels each overwrite a last-value slot at their
//! own cadence; every emission tick the hub merges the two latest values
//! into an [`EmotionSnapshot`] and publishes it on a watch channel the
//! shell subscribes to. Setup failure disables sensing for the session but
//! never takes the chat down: subscribers simply keep seeing the
//! neutral/silent default.

use crate::audio::MicCapture;
use crate::audio::capture::CHUNK_CHANNEL_CAPACITY;
use crate::config::EmpaConfig;
use crate::face::detector::OnnxExpressionDetector;
use crate::face::{ExpressionDetector, FacialReading};
use crate::sensor::frames::{FrameFeed, FrameSource, SnapshotFileSource, frame_feed};
use crate::sensor::level::VoiceLevelSensor;
use crate::sensor::messages::{AudioChunk, EmotionSnapshot, VocalBand};
use crate::sensor::vision::FaceSensor;
use crate::spectrum::SpectrumAnalyzer;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle state of the sensing subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorStatus {
    /// Devices and models are still being set up.
    Initializing,
    /// Both channels are live.
    Active,
    /// Setup or capture failed; sensing is disabled for this session.
    Failed(String),
}

/// Subscription handles returned by [`SensorHub::launch`].
pub struct SensorHandles {
    /// Latest merged emotion snapshot (updated every emission tick).
    pub snapshots: watch::Receiver<EmotionSnapshot>,
    /// Sensing subsystem status for the UI banner.
    pub status: watch::Receiver<SensorStatus>,
    /// Raw audio fan-out; dictation sessions subscribe here.
    pub audio: broadcast::Sender<AudioChunk>,
}

/// Coordinates the sensor stages.
pub struct SensorHub;

impl SensorHub {
    /// Set up devices and models, spawn the stage tasks, and return the
    /// subscription handles.
    ///
    /// Setup failure (no input device, missing model assets) is reported
    /// through the status watch rather than an error: the handles stay
    /// valid and keep yielding the default snapshot.
    pub fn launch(config: &EmpaConfig, cancel: CancellationToken) -> SensorHandles {
        let (status_tx, status_rx) = watch::channel(SensorStatus::Initializing);
        let (snapshot_tx, snapshot_rx) = watch::channel(EmotionSnapshot::default());
        let (audio_tx, _) = broadcast::channel(CHUNK_CHANNEL_CAPACITY);

        let handles = SensorHandles {
            snapshots: snapshot_rx,
            status: status_rx,
            audio: audio_tx.clone(),
        };

        let detector = match OnnxExpressionDetector::new(&config.vision) {
            Ok(d) => d,
            Err(e) => {
                warn!("sensing disabled: {e}");
                status_tx.send_replace(SensorStatus::Failed(e.to_string()));
                return handles;
            }
        };

        let mic = match MicCapture::new(&config.audio) {
            Ok(m) => m,
            Err(e) => {
                warn!("sensing disabled: {e}");
                status_tx.send_replace(SensorStatus::Failed(e.to_string()));
                return handles;
            }
        };

        let (frame_publisher, feed) = frame_feed();
        if let Some(ref path) = config.vision.frame_path {
            let source = SnapshotFileSource::new(&config.vision, path.clone());
            let source_cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = source.run(frame_publisher, source_cancel).await {
                    warn!("frame source exited: {e}");
                }
            });
        } else {
            info!("no frame path configured; facial channel stays neutral");
        }

        let capture_status = status_tx.clone();
        let capture_cancel = cancel.clone();
        let capture_tx = audio_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = mic.run(capture_tx, capture_cancel).await {
                warn!("audio capture failed: {e}");
                capture_status.send_replace(SensorStatus::Failed(e.to_string()));
            }
        });

        Self::spawn_stages(
            Box::new(detector),
            feed,
            audio_tx.subscribe(),
            config,
            snapshot_tx,
            cancel,
        );

        status_tx.send_replace(SensorStatus::Active);
        handles
    }

    /// Wire the analysis stages and the emission timer around the given
    /// detector, frame feed, and audio subscription.
    pub fn spawn_stages(
        detector: Box<dyn ExpressionDetector>,
        feed: FrameFeed,
        audio_rx: broadcast::Receiver<AudioChunk>,
        config: &EmpaConfig,
        snapshot_tx: watch::Sender<EmotionSnapshot>,
        cancel: CancellationToken,
    ) {
        let (face_tx, face_rx) = watch::channel(FacialReading::neutral());
        let (band_tx, band_rx) = watch::channel(VocalBand::Silent);

        let face_sensor = FaceSensor::new(
            detector,
            feed,
            Duration::from_millis(config.sensor.detect_interval_ms.max(1)),
        );
        tokio::spawn(face_sensor.run(face_tx, cancel.clone()));

        let level_sensor = VoiceLevelSensor::new(SpectrumAnalyzer::new(
            config.sensor.fft_size,
            config.sensor.smoothing,
        ));
        tokio::spawn(level_sensor.run(audio_rx, band_tx, cancel.clone()));

        let emit_interval = Duration::from_millis(config.sensor.emit_interval_ms.max(1));
        tokio::spawn(Self::emit_loop(
            face_rx,
            band_rx,
            snapshot_tx,
            emit_interval,
            cancel,
        ));
    }

    /// Merge and publish the latest channel values on a fixed interval.
    async fn emit_loop(
        face_rx: watch::Receiver<FacialReading>,
        band_rx: watch::Receiver<VocalBand>,
        snapshot_tx: watch::Sender<EmotionSnapshot>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        info!("snapshot emitter started ({}ms interval)", interval.as_millis());
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let facial = *face_rx.borrow();
            let band = *band_rx.borrow();
            snapshot_tx.send_replace(EmotionSnapshot::merge(facial, band));
        }

        info!("snapshot emitter stopped");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::Result;
    use crate::face::{Expression, ExpressionScores, FaceObservation, FaceRegion};
    use crate::sensor::messages::VideoFrame;
    use std::time::Instant;

    struct AlwaysHappy;

    impl ExpressionDetector for AlwaysHappy {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceObservation>> {
            let mut scores = ExpressionScores::default();
            scores.0[1] = 0.9;
            Ok(vec![FaceObservation {
                score: 0.99,
                region: FaceRegion {
                    x: 0,
                    y: 0,
                    width: 16,
                    height: 16,
                },
                expressions: scores,
            }])
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stages_merge_into_snapshots() {
        let mut config = EmpaConfig::default();
        config.sensor.detect_interval_ms = 5;
        config.sensor.emit_interval_ms = 5;

        let (publisher, feed) = crate::sensor::frames::frame_feed();
        publisher.publish(VideoFrame {
            data: vec![0; 16 * 16 * 3],
            width: 16,
            height: 16,
            captured_at: Instant::now(),
        });

        let (audio_tx, audio_rx) = broadcast::channel(8);
        let (snapshot_tx, mut snapshot_rx) = watch::channel(EmotionSnapshot::default());
        let cancel = CancellationToken::new();

        SensorHub::spawn_stages(
            Box::new(AlwaysHappy),
            feed,
            audio_rx,
            &config,
            snapshot_tx,
            cancel.clone(),
        );

        // A silent window should classify as silent alongside the happy face.
        audio_tx
            .send(AudioChunk {
                samples: vec![0.0; 1024],
                sample_rate: 16_000,
                captured_at: Instant::now(),
            })
            .unwrap();

        let mut merged = EmotionSnapshot::default();
        for _ in 0..20 {
            snapshot_rx.changed().await.unwrap();
            merged = *snapshot_rx.borrow();
            if merged.expression == Expression::Happy {
                break;
            }
        }

        assert_eq!(merged.expression, Expression::Happy);
        assert_eq!(merged.voice, VocalBand::Silent);

        cancel.cancel();
    }
}
