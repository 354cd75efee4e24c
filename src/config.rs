use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use anyhow::Context;

/// Rejected tracker settings.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("n_init must be at least 1")]
    ZeroInit,
    #[error("confidence_threshold must lie in [0, 1], got {0}")]
    ConfidenceThreshold(f32),
    #[error("cost_gate must be finite and positive, got {0}")]
    CostGate(f64),
    #[error("appearance_weight must lie in [0, 1], got {0}")]
    AppearanceWeight(f64),
    #[error("feature_smoothing must lie in [0, 1), got {0}")]
    FeatureSmoothing(f32),
}

/// Tracker settings, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a confirmed track may go unmatched before it is deleted.
    pub max_age: u32,
    /// Matches needed before a tentative track is confirmed.
    pub n_init: u32,
    /// Detections scoring below this never reach association.
    pub confidence_threshold: f32,
    /// Pairs costing more than this are never matched.
    pub cost_gate: f64,
    /// Coast unmatched tracks along their Kalman prediction.
    pub motion_model: bool,
    /// Share of the appearance term in the pair cost; 0 means IoU only.
    pub appearance_weight: f64,
    /// EMA factor applied to track appearance features.
    pub feature_smoothing: f32,
    /// Reject pairs outside the 95% Mahalanobis gate.
    pub motion_gating: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            n_init: 3,
            confidence_threshold: 0.5,
            cost_gate: 0.7,
            motion_model: true,
            appearance_weight: 0.0,
            feature_smoothing: 0.9,
            motion_gating: false,
        }
    }
}

impl TrackerConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: TrackerConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_init == 0 {
            return Err(ConfigError::ZeroInit);
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ConfidenceThreshold(self.confidence_threshold));
        }
        if !self.cost_gate.is_finite() || self.cost_gate <= 0.0 {
            return Err(ConfigError::CostGate(self.cost_gate));
        }
        if !(0.0..=1.0).contains(&self.appearance_weight) {
            return Err(ConfigError::AppearanceWeight(self.appearance_weight));
        }
        if !(0.0..1.0).contains(&self.feature_smoothing) {
            return Err(ConfigError::FeatureSmoothing(self.feature_smoothing));
        }
        Ok(())
    }
}
