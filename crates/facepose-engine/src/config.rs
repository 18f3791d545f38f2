use facepose_core::classifier::{
    PoseThresholds, DEFAULT_DOWN_RATIO, DEFAULT_HORIZONTAL_RATIO, DEFAULT_REGION_DIVISOR,
    DEFAULT_UP_RATIO,
};
use facepose_core::detector::DEFAULT_MIN_DETECTION_CONFIDENCE;
use facepose_core::matcher::DEFAULT_SIMILARITY_THRESHOLD;
use facepose_core::sequencer::{PoseRequirement, ScriptError};
use facepose_core::PoseScript;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read pose script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("pose script is not valid TOML: {0}")]
    ScriptParse(#[from] toml::de::Error),
    #[error("invalid pose script: {0}")]
    Script(#[from] ScriptError),
    #[error("region divisor must be a positive finite number, got {0}")]
    RegionDivisor(f32),
}

/// Engine configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite gallery file.
    pub db_path: PathBuf,
    /// Cosine similarity an identity must exceed to match.
    pub similarity_threshold: f32,
    /// Minimum confidence for the first detection to be used.
    pub min_detection_confidence: f32,
    /// Direction threshold ratios.
    pub thresholds: PoseThresholds,
    /// Target circle radius is `min(preview w, h) / region_divisor`.
    pub region_divisor: f32,
    /// Poses to collect during enrollment.
    pub pose_script: PoseScript,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_data_dir().join("gallery.db"),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            thresholds: PoseThresholds::default(),
            region_divisor: DEFAULT_REGION_DIVISOR,
            pose_script: PoseScript::default(),
        }
    }
}

impl Config {
    /// Load configuration from `FACEPOSE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("FACEPOSE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir().join("gallery.db"));

        let pose_script = match std::env::var("FACEPOSE_POSE_SCRIPT") {
            Ok(path) => load_pose_script(Path::new(&path))?,
            Err(_) => PoseScript::default(),
        };

        Ok(Self {
            db_path,
            similarity_threshold: env_f32(
                "FACEPOSE_SIMILARITY_THRESHOLD",
                DEFAULT_SIMILARITY_THRESHOLD,
            ),
            min_detection_confidence: env_f32(
                "FACEPOSE_MIN_DETECTION_CONFIDENCE",
                DEFAULT_MIN_DETECTION_CONFIDENCE,
            ),
            thresholds: PoseThresholds {
                horizontal_ratio: env_f32("FACEPOSE_HORIZONTAL_RATIO", DEFAULT_HORIZONTAL_RATIO),
                up_ratio: env_f32("FACEPOSE_UP_RATIO", DEFAULT_UP_RATIO),
                down_ratio: env_f32("FACEPOSE_DOWN_RATIO", DEFAULT_DOWN_RATIO),
            },
            region_divisor: check_region_divisor(env_f32(
                "FACEPOSE_REGION_DIVISOR",
                DEFAULT_REGION_DIVISOR,
            ))?,
            pose_script,
        })
    }
}

/// `$XDG_DATA_HOME/facepose`, falling back to `~/.local/share/facepose`.
fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facepose")
}

#[derive(Deserialize)]
struct ScriptFile {
    step: Vec<PoseRequirement>,
}

/// Parse a pose script from TOML `[[step]]` tables.
pub fn parse_pose_script(src: &str) -> Result<PoseScript, ConfigError> {
    let file: ScriptFile = toml::from_str(src)?;
    Ok(PoseScript::new(file.step)?)
}

pub fn load_pose_script(path: &Path) -> Result<PoseScript, ConfigError> {
    let src = std::fs::read_to_string(path).map_err(|source| ConfigError::ScriptRead {
        path: path.to_path_buf(),
        source,
    })?;
    let script = parse_pose_script(&src)?;
    tracing::info!(path = %path.display(), steps = script.len(), "pose script loaded");
    Ok(script)
}

/// A zero, negative or NaN divisor would make the target circle meaningless.
fn check_region_divisor(divisor: f32) -> Result<f32, ConfigError> {
    if divisor.is_finite() && divisor > 0.0 {
        Ok(divisor)
    } else {
        Err(ConfigError::RegionDivisor(divisor))
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
