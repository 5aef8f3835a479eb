// src/possession.rs - Is the ball still in the shooting hand?
use crate::config::EngineConfig;
use crate::detection::DetectedObject;
use crate::pose::{ConfidenceGate, JointSet, Side};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PossessionState {
    #[default]
    Undetermined,
    InHand,
    Released,
}

impl PossessionState {
    pub fn status_text(&self) -> &'static str {
        match self {
            PossessionState::Undetermined => "Ball not detected",
            PossessionState::InHand => "Ball in hand",
            PossessionState::Released => "Ball released",
        }
    }
}

impl fmt::Display for PossessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}

#[derive(Debug, Clone)]
pub struct PossessionClassifier {
    side: Side,
    gate: ConfidenceGate,
    ball_label: String,
    min_ball_confidence: f64,
}

impl PossessionClassifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            side: config.shooting_side,
            gate: ConfidenceGate::new(config.confidence_threshold),
            ball_label: config.ball_label.clone(),
            min_ball_confidence: config.min_ball_confidence,
        }
    }

    /// Both the wrist and the boxes must already be top-left origin.
    ///
    /// Without a pose there is nothing to relate the ball to, so the frame is
    /// undetermined even when a ball is visible.
    pub fn classify(
        &self,
        joints: Option<&JointSet>,
        detections: &[DetectedObject],
    ) -> PossessionState {
        let Some(joints) = joints.filter(|j| !j.is_empty()) else {
            return PossessionState::Undetermined;
        };

        let mut balls = detections
            .iter()
            .filter(|d| d.is_labelled(&self.ball_label))
            .filter(|d| d.confidence >= self.min_ball_confidence)
            .peekable();

        if balls.peek().is_none() {
            return PossessionState::Undetermined;
        }

        let wrist = self.gate.usable(joints, self.side.wrist());
        match wrist {
            Some(wrist) if balls.any(|ball| ball.bbox.contains(&wrist)) => PossessionState::InHand,
            _ => PossessionState::Released,
        }
    }
}
