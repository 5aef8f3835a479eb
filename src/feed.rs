// src/feed.rs - Recorded detector output, one JSON object per frame
use crate::detection::{BoundingBox, DetectedObject};
use crate::engine::FrameInput;
use crate::error::CoachError;
use crate::pose::{JointName, JointSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Joint as written by the pose detector, origin bottom-left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointRecord {
    pub name: JointName,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

/// Box as written by the object detector, origin bottom-left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRecord {
    pub index: u64,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// `None` means the pose detector found nobody.
    #[serde(default)]
    pub joints: Option<Vec<JointRecord>>,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
    /// Set when a detector failed on this frame.
    #[serde(default)]
    pub error: Option<String>,
}

/// Opaque handle for a replayed frame; this is what gets captured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRef {
    pub index: u64,
    pub timestamp: f64,
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FeedFrame {
    pub input: FrameInput,
    pub frame: FrameRef,
}

impl FeedRecord {
    /// Converts to engine coordinates. Failed frames become empty input.
    pub fn into_frame(self) -> FeedFrame {
        let frame = FrameRef {
            index: self.index,
            timestamp: self.timestamp,
            image: self.image,
        };

        if let Some(reason) = self.error {
            warn!(frame = self.index, %reason, "detector failure, treating frame as empty");
            return FeedFrame {
                input: FrameInput::empty(self.index),
                frame,
            };
        }

        let joints = self.joints.map(|records| {
            JointSet::from_detector(
                records
                    .into_iter()
                    .map(|j| (j.name, j.x, j.y, j.confidence)),
            )
        });

        let detections = self
            .detections
            .into_iter()
            .map(|d| {
                DetectedObject::new(
                    d.label,
                    BoundingBox::from_detector(d.x, d.y, d.width, d.height),
                    d.confidence,
                )
            })
            .collect();

        FeedFrame {
            input: FrameInput::new(self.index, joints, detections),
            frame,
        }
    }
}

/// Parses one feed line. `line` is 1-based for error messages.
pub fn parse_line(line: usize, text: &str) -> Result<FeedRecord, CoachError> {
    serde_json::from_str(text).map_err(|source| CoachError::FeedParse { line, source })
}

pub struct FeedReader {
    frames: Vec<FeedRecord>,
    current_frame: usize,
}

impl FeedReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoachError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let reader = Self::from_content(&content)?;
        info!(path = %path.display(), frames = reader.frames.len(), "feed loaded");
        Ok(reader)
    }

    /// Blank lines are skipped.
    pub fn from_content(content: &str) -> Result<Self, CoachError> {
        let frames = content
            .lines()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| parse_line(i + 1, text))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            frames,
            current_frame: 0,
        })
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn next_frame(&mut self) -> Option<FeedFrame> {
        let record = self.frames.get(self.current_frame)?.clone();
        self.current_frame += 1;
        Some(record.into_frame())
    }

    pub fn get_progress(&self) -> f32 {
        if self.frames.is_empty() {
            0.0
        } else {
            self.current_frame as f32 / self.frames.len() as f32
        }
    }
}

impl Iterator for FeedReader {
    type Item = FeedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}
