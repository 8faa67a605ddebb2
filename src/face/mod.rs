//! Facial expression vocabulary and dominant-expression selection.
//!
//! The detector reports a probability distribution over a fixed set of
//! seven expressions. The rest of the system only ever cares about the
//! single highest-probability label and its probability, so the selection
//! logic lives here as plain functions over [`ExpressionScores`].

pub mod detector;

use crate::error::Result;
use crate::sensor::messages::VideoFrame;

/// Fixed facial expression vocabulary.
///
/// The order matches the expression net's output logits; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expression {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    /// All expressions, in logit order.
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    /// Wire/display label for this expression.
    pub fn as_str(self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability distribution over the expression vocabulary.
///
/// Values are probabilities in `[0, 1]`, indexed by [`Expression::ALL`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionScores(pub [f32; 7]);

impl ExpressionScores {
    /// Probability for a single expression.
    pub fn score(&self, expression: Expression) -> f32 {
        let idx = Expression::ALL
            .iter()
            .position(|e| *e == expression)
            .unwrap_or(0);
        self.0[idx]
    }

    /// The highest-probability expression and its probability.
    ///
    /// Ties resolve to the earliest entry in [`Expression::ALL`], which is
    /// what a stable sort by descending probability would select.
    pub fn dominant(&self) -> (Expression, f32) {
        let mut best = Expression::ALL[0];
        let mut best_score = self.0[0];
        for (expression, score) in Expression::ALL.iter().zip(self.0.iter()).skip(1) {
            if *score > best_score {
                best = *expression;
                best_score = *score;
            }
        }
        (best, best_score)
    }
}

/// Rectangular face region in pixels on the source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One detected face with its expression distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    /// Detector confidence that this region contains a face.
    pub score: f32,
    /// Face bounding box on the source frame.
    pub region: FaceRegion,
    /// Expression probability distribution for this face.
    pub expressions: ExpressionScores,
}

/// Facial half of the emotion snapshot: dominant expression + confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacialReading {
    pub expression: Expression,
    pub confidence: f32,
}

impl FacialReading {
    /// The no-face / no-result fallback: neutral with zero confidence.
    pub fn neutral() -> Self {
        Self {
            expression: Expression::Neutral,
            confidence: 0.0,
        }
    }

    /// Reduce a detection pass to a single reading.
    ///
    /// Zero faces yields the neutral fallback; otherwise the first detected
    /// face wins and its dominant expression is reported.
    pub fn from_faces(faces: &[FaceObservation]) -> Self {
        match faces.first() {
            None => Self::neutral(),
            Some(face) => {
                let (expression, confidence) = face.expressions.dominant();
                Self {
                    expression,
                    confidence,
                }
            }
        }
    }
}

impl Default for FacialReading {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Narrow capability interface for face-expression inference.
///
/// The sensor loop depends only on this trait; the shipped adapter is
/// [`detector::OnnxExpressionDetector`].
pub trait ExpressionDetector: Send {
    /// Run one detection pass over a video frame.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails. Callers treat
    /// a failed pass as "no result this tick".
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn scores(pairs: &[(Expression, f32)]) -> ExpressionScores {
        let mut s = ExpressionScores::default();
        for (expression, value) in pairs {
            let idx = Expression::ALL.iter().position(|e| e == expression).unwrap();
            s.0[idx] = *value;
        }
        s
    }

    fn face_with(pairs: &[(Expression, f32)]) -> FaceObservation {
        FaceObservation {
            score: 0.9,
            region: FaceRegion {
                x: 0,
                y: 0,
                width: 64,
                height: 64,
            },
            expressions: scores(pairs),
        }
    }

    #[test]
    fn zero_faces_yields_neutral_zero() {
        let reading = FacialReading::from_faces(&[]);
        assert_eq!(reading.expression, Expression::Neutral);
        assert_eq!(reading.confidence, 0.0);
    }

    #[test]
    fn single_face_reports_dominant_expression() {
        let face = face_with(&[
            (Expression::Happy, 0.7),
            (Expression::Neutral, 0.2),
            (Expression::Sad, 0.1),
        ]);
        let reading = FacialReading::from_faces(&[face]);
        assert_eq!(reading.expression, Expression::Happy);
        assert!((reading.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn first_face_wins_when_multiple_detected() {
        let first = face_with(&[(Expression::Sad, 0.8)]);
        let second = face_with(&[(Expression::Happy, 0.9)]);
        let reading = FacialReading::from_faces(&[first, second]);
        assert_eq!(reading.expression, Expression::Sad);
    }

    #[test]
    fn dominant_tie_resolves_to_earliest_label() {
        // Neutral precedes happy in the vocabulary, so an exact tie picks it.
        let s = scores(&[(Expression::Neutral, 0.5), (Expression::Happy, 0.5)]);
        let (expression, confidence) = s.dominant();
        assert_eq!(expression, Expression::Neutral);
        assert!((confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn expression_labels_are_stable() {
        assert_eq!(Expression::Neutral.as_str(), "neutral");
        assert_eq!(Expression::Happy.as_str(), "happy");
        assert_eq!(Expression::Surprised.as_str(), "surprised");
    }
}
