//! ONNX face-expression inference.
//!
//! Two-stage pass: a lightweight face detector proposes boxes over the
//! full frame, then the expression net scores a grayscale crop of each
//! box. Both models load from the configured assets directory.

use super::{ExpressionDetector, ExpressionScores, FaceObservation, FaceRegion};
use crate::config::VisionConfig;
use crate::error::{EmpaError, Result};
use crate::sensor::messages::VideoFrame;
use image::{GrayImage, RgbImage};
use ort::session::Session;
use ort::session::{SessionInputValue, SessionInputs};
use ort::value::Tensor;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Face detector model filename within the assets directory.
pub const DETECTOR_ONNX: &str = "face_detector.onnx";

/// Expression net model filename within the assets directory.
pub const EXPRESSION_ONNX: &str = "face_expression.onnx";

/// Square grayscale input size the expression net expects.
const EXPRESSION_INPUT: u32 = 64;

/// Values per detector output row: score plus a normalized box.
const DETECTION_STRIDE: usize = 5;

/// ONNX-backed implementation of [`ExpressionDetector`].
pub struct OnnxExpressionDetector {
    detector: Session,
    expression: Session,
    score_threshold: f32,
    detector_input: u32,
}

impl OnnxExpressionDetector {
    /// Load both models from the configured assets directory.
    ///
    /// # Errors
    ///
    /// Returns an error if either model file is missing or fails to load.
    pub fn new(config: &VisionConfig) -> Result<Self> {
        let detector = load_session(&config.model_dir.join(DETECTOR_ONNX))?;
        let expression = load_session(&config.model_dir.join(EXPRESSION_ONNX))?;

        info!(
            "face expression detector ready (assets: {})",
            config.model_dir.display()
        );

        Ok(Self {
            detector,
            expression,
            score_threshold: config.score_threshold,
            detector_input: config.detector_input,
        })
    }

    /// Run the face detector over the full frame and return scored regions.
    fn detect_regions(&mut self, rgb: &RgbImage) -> Result<Vec<(f32, FaceRegion)>> {
        let size = self.detector_input;
        let resized = image::imageops::resize(
            rgb,
            size,
            size,
            image::imageops::FilterType::Triangle,
        );

        let plane = (size * size) as usize;
        let mut input = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = (y * size + x) as usize;
            for channel in 0..3 {
                input[channel * plane + offset] = f32::from(pixel[channel]) / 255.0;
            }
        }

        let tensor = Tensor::from_array(([1_usize, 3, size as usize, size as usize], input))
            .map_err(|e| EmpaError::Vision(format!("failed to create detector tensor: {e}")))?;

        let mut feed: HashMap<String, SessionInputValue> = HashMap::new();
        feed.insert("input".to_owned(), tensor.into());

        let outputs = self
            .detector
            .run(SessionInputs::from(feed))
            .map_err(|e| EmpaError::Vision(format!("face detection inference failed: {e}")))?;

        let (_shape, data) = outputs[0_usize]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmpaError::Vision(format!("failed to extract detections: {e}")))?;

        let mut regions = Vec::new();
        for row in data.chunks_exact(DETECTION_STRIDE) {
            let score = row[0];
            if score < self.score_threshold {
                continue;
            }
            if let Some(region) = normalized_box_to_region(
                row[1],
                row[2],
                row[3],
                row[4],
                rgb.width(),
                rgb.height(),
            ) {
                regions.push((score, region));
            }
        }

        debug!("detector found {} face region(s)", regions.len());
        Ok(regions)
    }

    /// Score the expression distribution for one face crop.
    fn score_expressions(&mut self, rgb: &RgbImage, region: FaceRegion) -> Result<ExpressionScores> {
        let crop =
            image::imageops::crop_imm(rgb, region.x, region.y, region.width, region.height)
                .to_image();
        let gray: GrayImage = image::imageops::grayscale(&crop);
        let resized = image::imageops::resize(
            &gray,
            EXPRESSION_INPUT,
            EXPRESSION_INPUT,
            image::imageops::FilterType::Triangle,
        );

        let input: Vec<f32> = resized.into_raw().iter().map(|p| f32::from(*p) / 255.0).collect();
        let side = EXPRESSION_INPUT as usize;
        let tensor = Tensor::from_array(([1_usize, 1, side, side], input))
            .map_err(|e| EmpaError::Vision(format!("failed to create expression tensor: {e}")))?;

        let mut feed: HashMap<String, SessionInputValue> = HashMap::new();
        feed.insert("input".to_owned(), tensor.into());

        let outputs = self
            .expression
            .run(SessionInputs::from(feed))
            .map_err(|e| EmpaError::Vision(format!("expression inference failed: {e}")))?;

        let (_shape, logits) = outputs[0_usize]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmpaError::Vision(format!("failed to extract expression logits: {e}")))?;

        if logits.len() < 7 {
            return Err(EmpaError::Vision(format!(
                "expression net returned {} logits, expected 7",
                logits.len()
            )));
        }

        let mut scores = [0.0f32; 7];
        scores.copy_from_slice(&logits[..7]);
        Ok(ExpressionScores(softmax(scores)))
    }
}

impl ExpressionDetector for OnnxExpressionDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| EmpaError::Vision("frame buffer does not match dimensions".into()))?;

        let regions = self.detect_regions(&rgb)?;

        let mut observations = Vec::with_capacity(regions.len());
        for (score, region) in regions {
            let expressions = self.score_expressions(&rgb, region)?;
            observations.push(FaceObservation {
                score,
                region,
                expressions,
            });
        }
        Ok(observations)
    }
}

/// Open an ONNX session from a model file.
fn load_session(path: &Path) -> Result<Session> {
    if !path.exists() {
        return Err(EmpaError::Model(format!(
            "model asset not found: {} (run empa-fetch-models)",
            path.display()
        )));
    }
    Session::builder()
        .and_then(|b| b.with_intra_threads(2))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| EmpaError::Model(format!("failed to load {}: {e}", path.display())))
}

/// Map a normalized `(x, y, w, h)` box onto pixel coordinates, clamped to
/// the frame. Returns `None` for degenerate boxes.
fn normalized_box_to_region(
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    frame_width: u32,
    frame_height: u32,
) -> Option<FaceRegion> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;

    let left = (x.clamp(0.0, 1.0) * fw) as u32;
    let top = (y.clamp(0.0, 1.0) * fh) as u32;
    let width = ((w.clamp(0.0, 1.0) * fw) as u32).min(frame_width.saturating_sub(left));
    let height = ((h.clamp(0.0, 1.0) * fh) as u32).min(frame_height.saturating_sub(top));

    if width == 0 || height == 0 {
        return None;
    }

    Some(FaceRegion {
        x: left,
        y: top,
        width,
        height,
    })
}

/// Numerically stable softmax over the expression logits.
fn softmax(logits: [f32; 7]) -> [f32; 7] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = [0.0f32; 7];
    let mut sum = 0.0f32;
    for (o, l) in out.iter_mut().zip(logits.iter()) {
        *o = (l - max).exp();
        sum += *o;
    }
    if sum > 0.0 {
        for o in &mut out {
            *o /= sum;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax([1.0, 2.0, 3.0, 0.0, -1.0, 0.5, 2.5]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn softmax_preserves_order() {
        let probs = softmax([0.0, 4.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(probs[1] > probs[2]);
        assert!(probs[2] > probs[0]);
    }

    #[test]
    fn box_mapping_clamps_to_frame() {
        let region = normalized_box_to_region(0.9, 0.9, 0.5, 0.5, 100, 100).unwrap();
        assert!(region.x + region.width <= 100);
        assert!(region.y + region.height <= 100);
    }

    #[test]
    fn degenerate_box_is_rejected() {
        assert!(normalized_box_to_region(1.0, 1.0, 0.5, 0.5, 100, 100).is_none());
        assert!(normalized_box_to_region(0.1, 0.1, 0.0, 0.2, 100, 100).is_none());
    }

    #[test]
    fn missing_model_file_reports_model_error() {
        let config = VisionConfig {
            model_dir: std::path::PathBuf::from("/nonexistent/empa-models"),
            ..VisionConfig::default()
        };
        let result = OnnxExpressionDetector::new(&config);
        assert!(matches!(result, Err(EmpaError::Model(_))));
    }
}
