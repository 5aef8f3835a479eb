// src/data.rs - Session export: per-frame CSV, captured frames, result report
use crate::capture::CaptureEvent;
use crate::engine::FrameOutcome;
use crate::evaluator::{BodyRegion, Verdict};
use crate::feed::FrameRef;
use crate::possession::PossessionState;
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct AnalysisRecord {
    frame: u64,
    timestamp: f64,
    pose_detected: bool,
    pose_confidence: f64,

    elbow_feedback: String,
    elbow_angle: Option<f64>,
    knee_feedback: String,
    knee_angle: Option<f64>,
    balance_feedback: String,
    balance_deviation: Option<f64>,

    verdict: String,
    overlay: String,
    possession: String,
    captured: bool,
    phase: String,
}

#[derive(Debug, Clone, Serialize)]
struct CaptureMetadata<'a> {
    id: String,
    generation: u64,
    frame_index: u64,
    captured_at: String,
    source: &'a FrameRef,
}

#[derive(Debug, Clone)]
pub struct ExportedCapture {
    pub frame_index: u64,
    pub path: PathBuf,
}

pub struct SessionExporter {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<AnalysisRecord>,
    captures: Vec<ExportedCapture>,
}

impl SessionExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
            captures: Vec::new(),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn captures(&self) -> &[ExportedCapture] {
        &self.captures
    }

    pub fn frame_count(&self) -> usize {
        self.records.len()
    }

    pub fn add_frame<F>(&mut self, outcome: &FrameOutcome<F>, timestamp: f64) {
        let region = |r: BodyRegion| {
            outcome
                .assessment
                .region(r)
                .map(|f| (f.message().to_string(), f.measurement))
                .unwrap_or_default()
        };
        let (elbow_feedback, elbow_angle) = region(BodyRegion::Elbow);
        let (knee_feedback, knee_angle) = region(BodyRegion::Knee);
        let (balance_feedback, balance_deviation) = region(BodyRegion::Balance);

        self.records.push(AnalysisRecord {
            frame: outcome.frame_index,
            timestamp,
            pose_detected: outcome.assessment.pose_detected,
            pose_confidence: outcome.pose_confidence,
            elbow_feedback,
            elbow_angle,
            knee_feedback,
            knee_angle,
            balance_feedback,
            balance_deviation,
            verdict: format!("{:?}", outcome.assessment.verdict),
            overlay: format!("{:?}", outcome.assessment.overlay),
            possession: format!("{:?}", outcome.possession),
            captured: outcome.capture.is_some(),
            phase: format!("{:?}", outcome.phase),
        });
    }

    /// Writes the captured frame into the session's `captures/` directory.
    ///
    /// Frames with a source image are re-encoded as PNG; frames without one
    /// are recorded as a JSON description of the capture.
    pub fn export_capture(&mut self, event: &CaptureEvent<FrameRef>) -> Result<PathBuf> {
        let capture_dir = self.session_dir().join("captures");
        std::fs::create_dir_all(&capture_dir)
            .with_context(|| format!("Failed to create {}", capture_dir.display()))?;

        let path = match &event.frame.image {
            Some(source) => {
                let target = capture_dir.join(format!("release_{:05}.png", event.frame_index));
                let img = image::open(source)
                    .with_context(|| format!("Failed to open frame image: {}", source.display()))?;
                img.save(&target)
                    .with_context(|| format!("Failed to save capture: {}", target.display()))?;
                target
            }
            None => {
                warn!(frame = event.frame_index, "captured frame has no image, writing metadata only");
                let target = capture_dir.join(format!("release_{:05}.json", event.frame_index));
                let metadata = CaptureMetadata {
                    id: event.id.to_string(),
                    generation: event.generation,
                    frame_index: event.frame_index,
                    captured_at: event.captured_at.to_rfc3339(),
                    source: &event.frame,
                };
                let json = serde_json::to_string_pretty(&metadata)
                    .context("Failed to serialize capture metadata")?;
                std::fs::write(&target, json)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                target
            }
        };

        info!(frame = event.frame_index, path = %path.display(), "capture exported");
        self.captures.push(ExportedCapture {
            frame_index: event.frame_index,
            path: path.clone(),
        });
        Ok(path)
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("analysis.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn generate_report(&self) -> Result<PathBuf> {
        let report_path = self.session_dir().join("report.html");

        if let Some(parent) = report_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&report_path, self.create_html_report())?;
        Ok(report_path)
    }

    fn create_html_report(&self) -> String {
        let total_frames = self.records.len();
        let pose_frames = self.records.iter().filter(|r| r.pose_detected).count();
        let good_frames = self
            .records
            .iter()
            .filter(|r| r.verdict == format!("{:?}", Verdict::Good))
            .count();
        let in_hand_frames = self
            .records
            .iter()
            .filter(|r| r.possession == format!("{:?}", PossessionState::InHand))
            .count();

        let percent = |count: usize| {
            if total_frames == 0 {
                0.0
            } else {
                count as f64 / total_frames as f64 * 100.0
            }
        };

        let gallery: String = if self.captures.is_empty() {
            "<p>No release moment was captured.</p>".to_string()
        } else {
            self.captures
                .iter()
                .map(|c| {
                    let file = c
                        .path
                        .strip_prefix(self.session_dir())
                        .unwrap_or(&c.path)
                        .display()
                        .to_string();
                    if file.ends_with(".png") {
                        format!(
                            "<figure><img src=\"{}\" width=\"480\"><figcaption>Frame {}</figcaption></figure>",
                            file, c.frame_index
                        )
                    } else {
                        format!("<p>Frame {}: <a href=\"{}\">{}</a></p>", c.frame_index, file, file)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n        ")
        };

        format!(r#"
<!DOCTYPE html>
<html>
<head>
    <title>Free Throw Report - {}</title>
    <style>
        body {{ font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 40px; background: #f5f5f5; }}
        h1 {{ color: #333; }}
        .stats {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .stat-item {{ margin: 10px 0; }}
        .stat-label {{ font-weight: bold; color: #666; }}
        .stat-value {{ color: #E8702A; font-size: 1.2em; }}
        figure {{ display: inline-block; margin: 10px; }}
    </style>
</head>
<body>
    <h1>Free Throw Session Report</h1>
    <div class="stats">
        <h2>Session: {}</h2>
        <div class="stat-item">
            <span class="stat-label">Total Frames:</span>
            <span class="stat-value">{}</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Pose Detected:</span>
            <span class="stat-value">{:.1}%</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Good Form:</span>
            <span class="stat-value">{} frames</span>
        </div>
        <div class="stat-item">
            <span class="stat-label">Ball In Hand:</span>
            <span class="stat-value">{} frames</span>
        </div>
    </div>
    <h2>Release Moment</h2>
    <div class="gallery">
        {}
    </div>
</body>
</html>
"#,
            self.session_name,
            self.session_name,
            total_frames,
            percent(pose_frames),
            good_frames,
            in_hand_frames,
            gallery
        )
    }
}
