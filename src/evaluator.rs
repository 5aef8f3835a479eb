// src/evaluator.rs - Biomechanical rules applied to one frame's joints
use crate::config::{AngleBand, EngineConfig};
use crate::geometry::{angle_degrees, horizontal_deviation};
use crate::pose::{ConfidenceGate, JointName, JointSet, Side};
use serde::Serialize;
use std::fmt;

pub const POSE_UNCLEAR: &str = "Pose unclear for this region";
pub const NO_POSE_DETECTED: &str = "No pose detected";

/// Slack on band edges so a measurement that lands on a limit passes.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyRegion {
    Elbow,
    Knee,
    Balance,
}

impl BodyRegion {
    /// Order in which feedback lines are reported.
    pub const ALL: [BodyRegion; 3] = [BodyRegion::Elbow, BodyRegion::Knee, BodyRegion::Balance];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Finding {
    Good,
    ElbowTooNarrow,
    ElbowTooOpen,
    BendDeeper,
    KneeTooStraight,
    ImproveBalance,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionFeedback {
    pub region: BodyRegion,
    pub finding: Finding,
    /// Angle in degrees, or deviation sum for balance. `None` when unclear.
    pub measurement: Option<f64>,
}

impl RegionFeedback {
    fn unclear(region: BodyRegion) -> Self {
        Self {
            region,
            finding: Finding::Unclear,
            measurement: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.finding == Finding::Good
    }

    pub fn message(&self) -> &'static str {
        match (self.region, self.finding) {
            (_, Finding::Unclear) => POSE_UNCLEAR,
            (BodyRegion::Elbow, Finding::Good) => "Elbow angle good",
            (BodyRegion::Knee, Finding::Good) => "Knee bend good",
            (BodyRegion::Balance, Finding::Good) => "Balance good",
            (_, Finding::ElbowTooNarrow) => "Elbow too narrow, open the arm up",
            (_, Finding::ElbowTooOpen) => "Elbow too open, bring it in",
            (_, Finding::BendDeeper) => "Bend your knees deeper",
            (_, Finding::KneeTooStraight) => "Knees too straight",
            (_, Finding::ImproveBalance) => "Improve balance, stack shoulder over hip",
        }
    }
}

impl fmt::Display for RegionFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Good,
    NeedsCorrection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverlayColor {
    /// No pose at all this frame.
    Neutral,
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseAssessment {
    /// Always one entry per region, in [`BodyRegion::ALL`] order.
    pub feedback: Vec<RegionFeedback>,
    pub verdict: Verdict,
    pub overlay: OverlayColor,
    pub pose_detected: bool,
}

impl PoseAssessment {
    pub fn lines(&self) -> Vec<String> {
        self.feedback.iter().map(|f| f.message().to_string()).collect()
    }

    pub fn region(&self, region: BodyRegion) -> Option<&RegionFeedback> {
        self.feedback.iter().find(|f| f.region == region)
    }

    pub fn headline(&self) -> &'static str {
        if !self.pose_detected {
            return NO_POSE_DETECTED;
        }
        self.feedback
            .iter()
            .find(|f| !f.passed())
            .map(|f| f.message())
            .unwrap_or("Form looks good")
    }
}

/// Runs the elbow, knee and balance rules for the shooting side.
#[derive(Debug, Clone)]
pub struct PoseEvaluator {
    side: Side,
    gate: ConfidenceGate,
    elbow_band: AngleBand,
    knee_band: AngleBand,
    max_balance_deviation: f64,
}

impl PoseEvaluator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            side: config.shooting_side,
            gate: ConfidenceGate::new(config.confidence_threshold),
            elbow_band: config.elbow_band,
            knee_band: config.knee_band,
            max_balance_deviation: config.max_balance_deviation,
        }
    }

    /// An absent or empty joint set is "no pose", which is distinct from a
    /// present pose whose regions are unclear.
    pub fn evaluate(&self, joints: Option<&JointSet>) -> PoseAssessment {
        let Some(joints) = joints.filter(|j| !j.is_empty()) else {
            return PoseAssessment {
                feedback: BodyRegion::ALL.iter().map(|r| RegionFeedback::unclear(*r)).collect(),
                verdict: Verdict::NeedsCorrection,
                overlay: OverlayColor::Neutral,
                pose_detected: false,
            };
        };

        let feedback = vec![
            self.check_elbow(joints),
            self.check_knee(joints),
            self.check_balance(joints),
        ];

        let verdict = if feedback.iter().all(RegionFeedback::passed) {
            Verdict::Good
        } else {
            Verdict::NeedsCorrection
        };

        let overlay = match verdict {
            Verdict::Good => OverlayColor::Good,
            Verdict::NeedsCorrection => OverlayColor::Bad,
        };

        PoseAssessment {
            feedback,
            verdict,
            overlay,
            pose_detected: true,
        }
    }

    fn check_elbow(&self, joints: &JointSet) -> RegionFeedback {
        let names = [self.side.shoulder(), self.side.elbow(), self.side.wrist()];
        self.check_angle(
            joints,
            BodyRegion::Elbow,
            names,
            self.elbow_band,
            (Finding::ElbowTooNarrow, Finding::ElbowTooOpen),
        )
    }

    fn check_knee(&self, joints: &JointSet) -> RegionFeedback {
        let names = [self.side.hip(), self.side.knee(), self.side.ankle()];
        self.check_angle(
            joints,
            BodyRegion::Knee,
            names,
            self.knee_band,
            (Finding::BendDeeper, Finding::KneeTooStraight),
        )
    }

    fn check_angle(
        &self,
        joints: &JointSet,
        region: BodyRegion,
        names: [JointName; 3],
        band: AngleBand,
        (below, above): (Finding, Finding),
    ) -> RegionFeedback {
        let Some([a, b, c]) = self.gate.usable_triple(joints, names) else {
            return RegionFeedback::unclear(region);
        };

        let angle = angle_degrees(&a, &b, &c);
        if !angle.is_finite() {
            return RegionFeedback::unclear(region);
        }

        let finding = if angle < band.min - BOUNDARY_TOLERANCE {
            below
        } else if angle > band.max + BOUNDARY_TOLERANCE {
            above
        } else {
            Finding::Good
        };

        RegionFeedback {
            region,
            finding,
            measurement: Some(angle),
        }
    }

    fn check_balance(&self, joints: &JointSet) -> RegionFeedback {
        let names = [self.side.shoulder(), self.side.hip(), self.side.ankle()];
        let Some(chain) = self.gate.usable_triple(joints, names) else {
            return RegionFeedback::unclear(BodyRegion::Balance);
        };

        let deviation = horizontal_deviation(&chain);
        if !deviation.is_finite() {
            return RegionFeedback::unclear(BodyRegion::Balance);
        }

        let finding = if deviation > self.max_balance_deviation + BOUNDARY_TOLERANCE {
            Finding::ImproveBalance
        } else {
            Finding::Good
        };

        RegionFeedback {
            region: BodyRegion::Balance,
            finding,
            measurement: Some(deviation),
        }
    }
}
