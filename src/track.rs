use serde::Serialize;

use crate::detection::{BBox, Detection};
use crate::kalman_filter::{KalmanFilter, StateCovariance, StateMean};
use crate::utils::l2_normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

/// A maintained identity for one object across frames.
///
/// Only the owning `TrackerSession` mutates a track; callers see it through
/// the read-only accessors.
#[derive(Debug, Clone)]
pub struct Track {
    id: u64,
    state: TrackState,
    /// Last matched box, or the motion prediction while coasting
    bbox: BBox,
    hits: u32,
    /// Frames since creation
    age: u32,
    time_since_update: u32,
    mean: StateMean,
    covariance: StateCovariance,
    /// Smoothed, unit-length appearance feature
    feature: Option<Vec<f32>>,
}

impl Track {
    pub(crate) fn new(id: u64, detection: &Detection, kalman: &KalmanFilter, n_init: u32) -> Self {
        let (mean, covariance) = kalman.initiate(&detection.bbox.to_tlwh());
        let state = if n_init <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };
        let feature = detection.embedding.clone().map(|mut f| {
            l2_normalize(&mut f);
            f
        });
        Track {
            id,
            state,
            bbox: detection.bbox,
            hits: 1,
            age: 1,
            time_since_update: 0,
            mean,
            covariance,
            feature,
        }
    }

    /// Advance one frame. The box follows the prediction only when
    /// `follow_motion` is set.
    pub(crate) fn predict(&mut self, kalman: &KalmanFilter, follow_motion: bool) {
        let (mean, covariance) = kalman.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.time_since_update += 1;
        if follow_motion {
            self.bbox = BBox::from_tlwh(&self.mean.fixed_rows::<4>(0).into_owned());
        }
    }

    /// Apply a matched detection.
    pub(crate) fn update(
        &mut self,
        kalman: &KalmanFilter,
        detection: &Detection,
        n_init: u32,
        feature_smoothing: f32,
    ) {
        let (mean, covariance) = kalman.update(&self.mean, &self.covariance, &detection.bbox.to_tlwh());
        self.mean = mean;
        self.covariance = covariance;
        self.bbox = detection.bbox;
        self.hits += 1;
        self.time_since_update = 0;

        if self.state == TrackState::Tentative && self.hits >= n_init {
            self.state = TrackState::Confirmed;
        }

        if let Some(new_feat) = &detection.embedding {
            self.smooth_feature(new_feat, feature_smoothing);
        }
    }

    fn smooth_feature(&mut self, new_feat: &[f32], alpha: f32) {
        let mut smoothed = match &self.feature {
            Some(last) if last.len() == new_feat.len() => {
                let mut unit = new_feat.to_vec();
                l2_normalize(&mut unit);
                last.iter()
                    .zip(&unit)
                    .map(|(l, n)| alpha * l + (1.0 - alpha) * n)
                    .collect()
            }
            _ => new_feat.to_vec(),
        };
        l2_normalize(&mut smoothed);
        self.feature = Some(smoothed);
    }

    /// Called when the track found no detection this frame.
    pub(crate) fn mark_missed(&mut self, max_age: u32) {
        match self.state {
            TrackState::Tentative => self.state = TrackState::Deleted,
            TrackState::Confirmed if self.time_since_update > max_age => {
                self.state = TrackState::Deleted
            }
            _ => {}
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    pub fn feature(&self) -> Option<&[f32]> {
        self.feature.as_deref()
    }

    pub fn mean(&self) -> &StateMean {
        &self.mean
    }

    pub fn covariance(&self) -> &StateCovariance {
        &self.covariance
    }

    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }
}
