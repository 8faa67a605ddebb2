//! Facial detection polling loop.
//!
//! On a fixed interval, runs one detection pass over the latest video
//! frame and overwrites the shared facial reading. A tick with no frame,
//! no face, or a failed pass writes the neutral/zero fallback; previous
//! values are not retained.

use crate::face::{ExpressionDetector, FacialReading};
use crate::sensor::frames::FrameFeed;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic face-expression sensor.
pub struct FaceSensor {
    detector: Box<dyn ExpressionDetector>,
    feed: FrameFeed,
    interval: Duration,
}

impl FaceSensor {
    pub fn new(detector: Box<dyn ExpressionDetector>, feed: FrameFeed, interval: Duration) -> Self {
        Self {
            detector,
            feed,
            interval,
        }
    }

    /// Run the detection loop until cancelled.
    pub async fn run(mut self, readings: watch::Sender<FacialReading>, cancel: CancellationToken) {
        info!(
            "facial detection loop started ({}ms interval)",
            self.interval.as_millis()
        );
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let reading = match self.feed.latest() {
                None => FacialReading::neutral(),
                Some(frame) => {
                    // ONNX inference is synchronous; keep it off the async
                    // worker threads.
                    let result =
                        tokio::task::block_in_place(|| self.detector.detect(&frame));
                    match result {
                        Ok(faces) => FacialReading::from_faces(&faces),
                        Err(e) => {
                            debug!("detection pass failed, treating as no result: {e}");
                            FacialReading::neutral()
                        }
                    }
                }
            };

            readings.send_replace(reading);
        }

        info!("facial detection loop stopped");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::{EmpaError, Result};
    use crate::face::{Expression, ExpressionScores, FaceObservation, FaceRegion};
    use crate::sensor::frames::frame_feed;
    use crate::sensor::messages::VideoFrame;
    use std::time::Instant;

    struct ScriptedDetector {
        faces: Vec<FaceObservation>,
        fail: bool,
    }

    impl ExpressionDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceObservation>> {
            if self.fail {
                return Err(EmpaError::Vision("scripted failure".into()));
            }
            Ok(self.faces.clone())
        }
    }

    fn happy_face() -> FaceObservation {
        let mut scores = ExpressionScores::default();
        scores.0[1] = 0.7; // happy
        scores.0[0] = 0.2; // neutral
        scores.0[2] = 0.1; // sad
        FaceObservation {
            score: 0.95,
            region: FaceRegion {
                x: 0,
                y: 0,
                width: 32,
                height: 32,
            },
            expressions: scores,
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame {
            data: vec![0; 32 * 32 * 3],
            width: 32,
            height: 32,
            captured_at: Instant::now(),
        }
    }

    async fn run_one_tick(detector: ScriptedDetector, publish_frame: bool) -> FacialReading {
        let (publisher, feed) = frame_feed();
        if publish_frame {
            publisher.publish(frame());
        }

        let (tx, mut rx) = watch::channel(FacialReading::neutral());
        let cancel = CancellationToken::new();
        let sensor = FaceSensor::new(Box::new(detector), feed, Duration::from_millis(5));

        let task = tokio::spawn(sensor.run(tx, cancel.clone()));
        rx.changed().await.unwrap();
        let reading = *rx.borrow();
        cancel.cancel();
        let _ = task.await;
        reading
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detected_face_updates_reading() {
        let detector = ScriptedDetector {
            faces: vec![happy_face()],
            fail: false,
        };
        let reading = run_one_tick(detector, true).await;
        assert_eq!(reading.expression, Expression::Happy);
        assert!((reading.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_frame_reports_neutral() {
        let detector = ScriptedDetector {
            faces: vec![happy_face()],
            fail: false,
        };
        let reading = run_one_tick(detector, false).await;
        assert_eq!(reading.expression, Expression::Neutral);
        assert_eq!(reading.confidence, 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_pass_reports_neutral() {
        let detector = ScriptedDetector {
            faces: vec![happy_face()],
            fail: true,
        };
        let reading = run_one_tick(detector, true).await;
        assert_eq!(reading.expression, Expression::Neutral);
        assert_eq!(reading.confidence, 0.0);
    }
}
