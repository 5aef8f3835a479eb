// src/engine.rs - Per-frame pipeline: pose rules, possession, capture
use crate::capture::{CaptureEvent, CaptureSession, SessionPhase};
use crate::config::EngineConfig;
use crate::detection::DetectedObject;
use crate::evaluator::{PoseAssessment, PoseEvaluator};
use crate::pose::JointSet;
use crate::possession::{PossessionClassifier, PossessionState};
use tracing::debug;

/// Detector outputs for one frame, already in engine coordinates.
///
/// Collaborator failures arrive here as `joints: None` and no detections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub index: u64,
    pub joints: Option<JointSet>,
    pub detections: Vec<DetectedObject>,
}

impl FrameInput {
    pub fn new(index: u64, joints: Option<JointSet>, detections: Vec<DetectedObject>) -> Self {
        Self {
            index,
            joints,
            detections,
        }
    }

    pub fn empty(index: u64) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameOutcome<F> {
    pub frame_index: u64,
    pub assessment: PoseAssessment,
    /// Mean joint confidence, 0 without a pose.
    pub pose_confidence: f64,
    pub possession: PossessionState,
    pub capture: Option<CaptureEvent<F>>,
    /// Session phase after this frame.
    pub phase: SessionPhase,
}

/// Stateless apart from its configuration; share it freely across threads.
#[derive(Debug, Clone)]
pub struct Engine {
    evaluator: PoseEvaluator,
    classifier: PossessionClassifier,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            evaluator: PoseEvaluator::new(config),
            classifier: PossessionClassifier::new(config),
        }
    }

    pub fn evaluate(&self, joints: Option<&JointSet>) -> PoseAssessment {
        self.evaluator.evaluate(joints)
    }

    pub fn classify_possession(
        &self,
        joints: Option<&JointSet>,
        detections: &[DetectedObject],
    ) -> PossessionState {
        self.classifier.classify(joints, detections)
    }

    pub fn on_frame<F: Clone>(
        &self,
        input: &FrameInput,
        session: &CaptureSession<F>,
        frame: F,
    ) -> FrameOutcome<F> {
        let joints = input.joints.as_ref();
        let assessment = self.evaluate(joints);
        let possession = self.classify_possession(joints, &input.detections);
        let capture = session.arbitrate(possession, input.index, frame);
        let phase = session.phase();

        debug!(
            frame = input.index,
            verdict = ?assessment.verdict,
            possession = ?possession,
            captured = capture.is_some(),
            "frame analysed"
        );

        FrameOutcome {
            frame_index: input.index,
            assessment,
            pose_confidence: joints.map_or(0.0, JointSet::mean_confidence),
            possession,
            capture,
            phase,
        }
    }

    /// A fresh, armed session.
    pub fn start_session<F: Clone>(&self) -> CaptureSession<F> {
        CaptureSession::armed()
    }

    /// Begins a new attempt on an existing session, discarding earlier captures.
    pub fn reset_session<F: Clone>(&self, session: &CaptureSession<F>) {
        session.reset();
    }

    pub fn stop_session<F: Clone>(&self, session: &CaptureSession<F>) -> SessionPhase {
        session.stop()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use crate::evaluator::OverlayColor;
    use crate::geometry::Point;
    use crate::pose::JointName;

    fn holding(index: u64, in_hand: bool) -> FrameInput {
        let mut joints = JointSet::new();
        joints.insert(JointName::RightWrist, Point::new(0.5, 0.5), 0.9);
        let ball_x = if in_hand { 0.45 } else { 0.8 };
        let ball = DetectedObject::new("basketball", BoundingBox::new(ball_x, 0.45, 0.1, 0.1), 0.9);
        FrameInput::new(index, Some(joints), vec![ball])
    }

    #[test]
    fn test_empty_frame_is_fully_defined() {
        let engine = Engine::default();
        let session = engine.start_session::<()>();
        let outcome = engine.on_frame(&FrameInput::empty(0), &session, ());

        assert_eq!(outcome.assessment.overlay, OverlayColor::Neutral);
        assert_eq!(outcome.possession, PossessionState::Undetermined);
        assert_eq!(outcome.pose_confidence, 0.0);
        assert!(outcome.capture.is_none());
        assert_eq!(outcome.phase, SessionPhase::Armed);
    }

    #[test]
    fn test_capture_follows_possession() {
        let engine = Engine::default();
        let session = engine.start_session();

        let released = engine.on_frame(&holding(0, false), &session, 0u64);
        assert_eq!(released.possession, PossessionState::Released);
        assert!(released.capture.is_none());

        let held = engine.on_frame(&holding(1, true), &session, 1u64);
        assert_eq!(held.possession, PossessionState::InHand);
        assert!((held.pose_confidence - 0.9).abs() < 1e-9);
        assert_eq!(held.capture.map(|c| c.frame), Some(1));
        assert_eq!(held.phase, SessionPhase::Captured);
    }

    #[test]
    fn test_stop_then_reset() {
        let engine = Engine::default();
        let session = engine.start_session();
        assert_eq!(engine.stop_session(&session), SessionPhase::Idle);
        assert!(engine.on_frame(&holding(0, true), &session, 0u8).capture.is_none());

        engine.reset_session(&session);
        assert!(engine.on_frame(&holding(1, true), &session, 1u8).capture.is_some());
    }
}
