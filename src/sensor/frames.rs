//! Video frame feed: a last-frame-wins slot between a platform frame
//! source and the facial detection loop.
//!
//! Camera acquisition is a platform capability, so the detection loop
//! depends only on [`FrameFeed`]; whatever hosts the app pushes frames
//! through a [`FramePublisher`]. The shipped [`SnapshotFileSource`] polls
//! a still image kept current by an external grabber.

use crate::config::VisionConfig;
use crate::error::Result;
use crate::sensor::messages::VideoFrame;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Write half of the frame slot.
#[derive(Clone)]
pub struct FramePublisher {
    tx: watch::Sender<Option<VideoFrame>>,
}

impl FramePublisher {
    /// Publish a new frame, replacing whatever was there.
    pub fn publish(&self, frame: VideoFrame) {
        self.tx.send_replace(Some(frame));
    }
}

/// Read half of the frame slot.
#[derive(Clone)]
pub struct FrameFeed {
    rx: watch::Receiver<Option<VideoFrame>>,
}

impl FrameFeed {
    /// The most recently published frame, if any has arrived yet.
    pub fn latest(&self) -> Option<VideoFrame> {
        self.rx.borrow().clone()
    }
}

/// Create a connected publisher/feed pair.
pub fn frame_feed() -> (FramePublisher, FrameFeed) {
    let (tx, rx) = watch::channel(None);
    (FramePublisher { tx }, FrameFeed { rx })
}

/// Frame acquisition adapter contract. New platforms only need to
/// implement this trait.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Stable source identifier (e.g. `snapshot-file`).
    fn id(&self) -> &'static str;

    /// Start publishing frames until the cancellation token is triggered.
    async fn run(&self, publisher: FramePublisher, cancel: CancellationToken) -> Result<()>;
}

/// Frame source that re-reads a still image file on an interval.
///
/// Pairs with any external grabber that keeps a JPEG or PNG current
/// (e.g. `ffmpeg -f v4l2 ... -update 1 frame.jpg`).
pub struct SnapshotFileSource {
    path: PathBuf,
    interval: Duration,
}

impl SnapshotFileSource {
    pub fn new(config: &VisionConfig, path: PathBuf) -> Self {
        Self {
            path,
            interval: Duration::from_millis(config.frame_interval_ms.max(1)),
        }
    }

    fn read_frame(&self) -> Result<VideoFrame> {
        let bytes = std::fs::read(&self.path)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| crate::error::EmpaError::Vision(format!("frame decode failed: {e}")))?;
        let rgb = decoded.to_rgb8();
        Ok(VideoFrame {
            width: rgb.width(),
            height: rgb.height(),
            data: rgb.into_raw(),
            captured_at: Instant::now(),
        })
    }
}

#[async_trait]
impl FrameSource for SnapshotFileSource {
    fn id(&self) -> &'static str {
        "snapshot-file"
    }

    async fn run(&self, publisher: FramePublisher, cancel: CancellationToken) -> Result<()> {
        info!(
            "snapshot frame source polling {} every {}ms",
            self.path.display(),
            self.interval.as_millis()
        );

        let mut ticker = tokio::time::interval(self.interval);
        let mut reported_missing = false;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.read_frame() {
                Ok(frame) => {
                    reported_missing = false;
                    publisher.publish(frame);
                }
                Err(e) => {
                    // A missing or partially-written file is routine while the
                    // grabber is starting up; log once, not every tick.
                    if !reported_missing {
                        warn!("no frame at {}: {e}", self.path.display());
                        reported_missing = true;
                    } else {
                        debug!("frame read failed: {e}");
                    }
                }
            }
        }

        info!("snapshot frame source stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn test_frame(width: u32, height: u32) -> VideoFrame {
        VideoFrame {
            data: vec![0; (width * height * 3) as usize],
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn feed_starts_empty() {
        let (_publisher, feed) = frame_feed();
        assert!(feed.latest().is_none());
    }

    #[test]
    fn latest_frame_wins() {
        let (publisher, feed) = frame_feed();
        publisher.publish(test_frame(4, 4));
        publisher.publish(test_frame(8, 8));

        let latest = feed.latest().unwrap();
        assert_eq!(latest.width, 8);
    }

    #[test]
    fn feed_clones_share_the_slot() {
        let (publisher, feed) = frame_feed();
        let other = feed.clone();
        publisher.publish(test_frame(4, 4));
        assert!(feed.latest().is_some());
        assert!(other.latest().is_some());
    }
}
