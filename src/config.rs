// src/config.rs - Engine thresholds and replay settings
use crate::detection::BASKETBALL_LABEL;
use crate::error::CoachError;
use crate::pose::{Side, DEFAULT_CONFIDENCE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Inclusive passing band for an angle rule, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleBand {
    pub min: f64,
    pub max: f64,
}

impl AngleBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub shooting_side: Side,
    pub confidence_threshold: f64,
    pub elbow_band: AngleBand,
    pub knee_band: AngleBand,
    /// Largest tolerated shoulder/hip/ankle horizontal deviation sum.
    pub max_balance_deviation: f64,
    pub ball_label: String,
    /// Ball detections below this confidence are ignored.
    pub min_ball_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shooting_side: Side::Right,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            elbow_band: AngleBand::new(90.0, 110.0),
            knee_band: AngleBand::new(100.0, 150.0),
            max_balance_deviation: 0.1,
            ball_label: BASKETBALL_LABEL.to_string(),
            min_ball_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Length of a recording attempt, measured on frame timestamps.
    pub recording_window_secs: f64,
    pub output_directory: PathBuf,
    pub export_csv: bool,
    pub generate_report: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            recording_window_secs: 5.0,
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("FreeThrowCoach")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            export_csv: true,
            generate_report: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub engine: EngineConfig,
    pub replay: ReplayConfig,
}

impl CoachConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoachError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: CoachConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoachError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoachError> {
        let engine = &self.engine;
        if !(0.0..=1.0).contains(&engine.confidence_threshold) {
            return Err(CoachError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                engine.confidence_threshold
            )));
        }
        for (name, band) in [("elbow_band", engine.elbow_band), ("knee_band", engine.knee_band)] {
            if band.min > band.max || band.min < 0.0 || band.max > 180.0 {
                return Err(CoachError::Config(format!(
                    "{} must satisfy 0 <= min <= max <= 180, got {:?}",
                    name, band
                )));
            }
        }
        if engine.max_balance_deviation < 0.0 {
            return Err(CoachError::Config(
                "max_balance_deviation must not be negative".to_string(),
            ));
        }
        if engine.ball_label.is_empty() {
            return Err(CoachError::Config("ball_label must not be empty".to_string()));
        }
        if self.replay.recording_window_secs <= 0.0 {
            return Err(CoachError::Config(
                "recording_window_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_rules() {
        let config = EngineConfig::default();
        assert_eq!(config.elbow_band, AngleBand::new(90.0, 110.0));
        assert_eq!(config.knee_band, AngleBand::new(100.0, 150.0));
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.ball_label, "basketball");
        assert_eq!(config.shooting_side, Side::Right);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CoachConfig =
            serde_json::from_str(r#"{"engine": {"shooting_side": "left"}}"#).unwrap();
        assert_eq!(config.engine.shooting_side, Side::Left);
        assert_eq!(config.engine.knee_band, AngleBand::new(100.0, 150.0));
        assert_eq!(config.replay.recording_window_secs, 5.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coach.json");

        let mut config = CoachConfig::default();
        config.engine.max_balance_deviation = 0.2;
        config.replay.output_directory = dir.path().to_path_buf();
        config.save(&path).unwrap();

        let loaded = CoachConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_inverted_band() {
        let mut config = CoachConfig::default();
        config.engine.elbow_band = AngleBand::new(120.0, 90.0);
        assert!(matches!(config.validate(), Err(CoachError::Config(_))));
    }
}
