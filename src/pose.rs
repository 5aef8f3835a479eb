// src/pose.rs - Joint model and the confidence gate in front of every rule
use crate::geometry::{flip_vertical, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Joints below or at this confidence are ignored by every rule.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointName {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl JointName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JointName::Nose => "nose",
            JointName::LeftShoulder => "left_shoulder",
            JointName::RightShoulder => "right_shoulder",
            JointName::LeftElbow => "left_elbow",
            JointName::RightElbow => "right_elbow",
            JointName::LeftWrist => "left_wrist",
            JointName::RightWrist => "right_wrist",
            JointName::LeftHip => "left_hip",
            JointName::RightHip => "right_hip",
            JointName::LeftKnee => "left_knee",
            JointName::RightKnee => "right_knee",
            JointName::LeftAnkle => "left_ankle",
            JointName::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which arm takes the shot. Every rule reads joints from this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    #[default]
    Right,
}

impl Side {
    pub fn shoulder(self) -> JointName {
        match self {
            Side::Left => JointName::LeftShoulder,
            Side::Right => JointName::RightShoulder,
        }
    }

    pub fn elbow(self) -> JointName {
        match self {
            Side::Left => JointName::LeftElbow,
            Side::Right => JointName::RightElbow,
        }
    }

    pub fn wrist(self) -> JointName {
        match self {
            Side::Left => JointName::LeftWrist,
            Side::Right => JointName::RightWrist,
        }
    }

    pub fn hip(self) -> JointName {
        match self {
            Side::Left => JointName::LeftHip,
            Side::Right => JointName::RightHip,
        }
    }

    pub fn knee(self) -> JointName {
        match self {
            Side::Left => JointName::LeftKnee,
            Side::Right => JointName::RightKnee,
        }
    }

    pub fn ankle(self) -> JointName {
        match self {
            Side::Left => JointName::LeftAnkle,
            Side::Right => JointName::RightAnkle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub name: JointName,
    /// Normalized location, top-left origin.
    pub position: Point,
    pub confidence: f64,
}

/// All joints the pose detector reported for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointSet {
    joints: HashMap<JointName, Joint>,
}

impl JointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from detector-space observations (origin bottom-left).
    ///
    /// This is the only place the vertical axis is flipped.
    pub fn from_detector<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = (JointName, f64, f64, f64)>,
    {
        let joints = observations
            .into_iter()
            .map(|(name, x, y, confidence)| {
                (
                    name,
                    Joint {
                        name,
                        position: flip_vertical(x, y),
                        confidence,
                    },
                )
            })
            .collect();
        Self { joints }
    }

    /// Inserts a joint whose position is already top-left origin.
    pub fn insert(&mut self, name: JointName, position: Point, confidence: f64) {
        self.joints.insert(
            name,
            Joint {
                name,
                position,
                confidence,
            },
        );
    }

    pub fn get(&self, name: JointName) -> Option<&Joint> {
        self.joints.get(&name)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Mean confidence over every reported joint, 0 when empty.
    pub fn mean_confidence(&self) -> f64 {
        if self.joints.is_empty() {
            return 0.0;
        }
        self.joints.values().map(|j| j.confidence).sum::<f64>() / self.joints.len() as f64
    }
}

impl FromIterator<Joint> for JointSet {
    fn from_iter<T: IntoIterator<Item = Joint>>(iter: T) -> Self {
        Self {
            joints: iter.into_iter().map(|j| (j.name, j)).collect(),
        }
    }
}

/// Filters joints down to the ones a rule may trust.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGate {
    threshold: f64,
}

impl ConfidenceGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A joint is usable when present and strictly above the threshold.
    pub fn usable(&self, joints: &JointSet, name: JointName) -> Option<Point> {
        joints
            .get(name)
            .filter(|joint| joint.confidence > self.threshold)
            .map(|joint| joint.position)
    }

    /// All three joints or nothing.
    pub fn usable_triple(
        &self,
        joints: &JointSet,
        names: [JointName; 3],
    ) -> Option<[Point; 3]> {
        let a = self.usable(joints, names[0])?;
        let b = self.usable(joints, names[1])?;
        let c = self.usable(joints, names[2])?;
        Some([a, b, c])
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}
