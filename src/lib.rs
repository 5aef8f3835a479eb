// src/lib.rs - Free-throw form coach: shooting-form feedback, ball possession, release capture

pub mod capture;
pub mod config;
pub mod data;
pub mod detection;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod feed;
pub mod geometry;
pub mod pose;
pub mod possession;

pub use capture::{CaptureEvent, CaptureSession, CaptureSink, CapturedFrame, SessionPhase};
pub use config::{CoachConfig, EngineConfig, ReplayConfig};
pub use detection::{BoundingBox, DetectedObject};
pub use engine::{Engine, FrameInput, FrameOutcome};
pub use error::CoachError;
pub use evaluator::{OverlayColor, PoseAssessment, Verdict};
pub use pose::{Joint, JointName, JointSet, Side};
pub use possession::PossessionState;
