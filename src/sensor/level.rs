//! Vocal-energy sensor: spectrum analysis over the captured audio stream.

use crate::sensor::messages::{AudioChunk, VocalBand};
use crate::spectrum::SpectrumAnalyzer;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Continuous volume-band classifier over the microphone stream.
pub struct VoiceLevelSensor {
    analyzer: SpectrumAnalyzer,
}

impl VoiceLevelSensor {
    pub fn new(analyzer: SpectrumAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Consume audio chunks until cancelled, overwriting the shared band.
    pub async fn run(
        mut self,
        mut rx: broadcast::Receiver<AudioChunk>,
        bands: watch::Sender<VocalBand>,
        cancel: CancellationToken,
    ) {
        info!("vocal level sensor started");

        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(chunk) => chunk,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("vocal level sensor lagged, skipped {skipped} chunks");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if let Some(mean) = self.analyzer.feed(&chunk.samples) {
                bands.send_replace(VocalBand::from_mean_level(mean));
            }
        }

        info!("vocal level sensor stopped");
    }
}
