//! Pairwise dissimilarity between a live track and a detection.
//!
//! Association only sees the numbers these produce, so strategies can be
//! swapped without touching the track lifecycle.

use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::kalman_filter::{chi2inv95, KalmanFilter};
use crate::track::Track;
use crate::utils::{compute_iou, cosine_distance};

/// Lower is more similar. Returning a non-finite value marks the pair as
/// impossible.
pub trait CostFunction: Send {
    fn cost(&self, track: &Track, detection: &Detection) -> f64;

    fn name(&self) -> &'static str;
}

/// `1 - IoU` between the track's current box and the detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct IouCost;

impl CostFunction for IouCost {
    fn cost(&self, track: &Track, detection: &Detection) -> f64 {
        1.0 - f64::from(compute_iou(track.bbox(), &detection.bbox))
    }

    fn name(&self) -> &'static str {
        "iou"
    }
}

/// Cosine distance between the track feature and the detection embedding.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppearanceCost;

impl CostFunction for AppearanceCost {
    fn cost(&self, track: &Track, detection: &Detection) -> f64 {
        match (track.feature(), detection.embedding.as_deref()) {
            (Some(t), Some(d)) => cosine_distance(t, d).map_or(f64::INFINITY, f64::from),
            _ => f64::INFINITY,
        }
    }

    fn name(&self) -> &'static str {
        "appearance"
    }
}

/// `w * appearance + (1 - w) * iou`. Falls back to IoU alone when either
/// side has no usable feature.
#[derive(Debug, Clone, Copy)]
pub struct HybridCost {
    appearance_weight: f64,
}

impl HybridCost {
    pub fn new(appearance_weight: f64) -> Self {
        Self {
            appearance_weight: appearance_weight.clamp(0.0, 1.0),
        }
    }
}

impl CostFunction for HybridCost {
    fn cost(&self, track: &Track, detection: &Detection) -> f64 {
        let iou = IouCost.cost(track, detection);
        let appearance = AppearanceCost.cost(track, detection);
        if !appearance.is_finite() {
            return iou;
        }
        self.appearance_weight * appearance + (1.0 - self.appearance_weight) * iou
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}

/// Wraps another strategy and rules out pairs that fall outside the
/// track's 95% Mahalanobis gate.
pub struct MotionGate {
    inner: Box<dyn CostFunction>,
    kalman: KalmanFilter,
    threshold: f32,
}

impl MotionGate {
    pub fn new(inner: Box<dyn CostFunction>) -> Self {
        Self {
            inner,
            kalman: KalmanFilter::new(),
            // four measured dimensions: x, y, w, h
            threshold: chi2inv95(4).unwrap_or(9.4877),
        }
    }
}

impl CostFunction for MotionGate {
    fn cost(&self, track: &Track, detection: &Detection) -> f64 {
        let distance = self.kalman.gating_distance(
            track.mean(),
            track.covariance(),
            &[detection.bbox.to_tlwh()],
        );
        match distance.first() {
            Some(d) if d.is_finite() && *d <= self.threshold => self.inner.cost(track, detection),
            _ => f64::INFINITY,
        }
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Strategy selected by the config: IoU unless an appearance weight is set,
/// optionally behind the motion gate.
pub fn from_config(config: &TrackerConfig) -> Box<dyn CostFunction> {
    let base: Box<dyn CostFunction> = if config.appearance_weight > 0.0 {
        Box::new(HybridCost::new(config.appearance_weight))
    } else {
        Box::new(IouCost)
    };
    if config.motion_gating {
        Box::new(MotionGate::new(base))
    } else {
        base
    }
}
