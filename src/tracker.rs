use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::association::{associate, Association};
use crate::config::{ConfigError, TrackerConfig};
use crate::cost::{self, CostFunction};
use crate::detection::{BBox, Detection};
use crate::kalman_filter::KalmanFilter;
use crate::track::Track;

/// A confirmed track as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedObject {
    pub id: u64,
    pub bbox: BBox,
    pub hits: u32,
    pub age: u32,
    /// Non-zero while the track is coasting without a match
    pub time_since_update: u32,
}

impl From<&Track> for TrackedObject {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id(),
            bbox: *track.bbox(),
            hits: track.hits(),
            age: track.age(),
            time_since_update: track.time_since_update(),
        }
    }
}

/// Everything one `step` did, for callers that need more than the tracks.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Confirmed tracks after this frame, ascending id
    pub tracked: Vec<TrackedObject>,
    /// Detection indices refer to `accepted`
    pub association: Association,
    /// Indices into the input slice of detections that reached association
    pub accepted: Vec<usize>,
    /// Malformed detections dropped this frame
    pub rejected: usize,
    /// Valid detections dropped for low confidence
    pub below_threshold: usize,
    pub created: Vec<u64>,
    pub deleted: Vec<u64>,
}

/// Owns every track of one video stream.
///
/// Feed it one `update` per frame in frame order; each call is one tick of
/// track age.
pub struct TrackerSession {
    config: TrackerConfig,
    kalman: KalmanFilter,
    cost: Box<dyn CostFunction>,
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
    frame_count: u64,
}

impl TrackerSession {
    /// Session using the cost strategy the config selects.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        let cost = cost::from_config(&config);
        Self::with_cost(config, cost)
    }

    /// Session with a caller-supplied cost strategy.
    pub fn with_cost(
        config: TrackerConfig,
        cost: Box<dyn CostFunction>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            max_age = config.max_age,
            n_init = config.n_init,
            confidence_threshold = config.confidence_threshold,
            cost_gate = config.cost_gate,
            cost = cost.name(),
            "tracker session created"
        );
        Ok(Self {
            config,
            kalman: KalmanFilter::new(),
            cost,
            tracks: BTreeMap::new(),
            next_id: 1,
            frame_count: 0,
        })
    }

    /// Process one frame and return the confirmed tracks, sorted by id.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedObject> {
        self.step(detections).tracked
    }

    /// Like `update`, also reporting what happened along the way.
    pub fn step(&mut self, detections: &[Detection]) -> StepOutcome {
        self.frame_count += 1;
        let mut outcome = StepOutcome::default();

        // 1. filter
        let mut kept: Vec<&Detection> = Vec::with_capacity(detections.len());
        for (idx, det) in detections.iter().enumerate() {
            if let Err(e) = det.validate() {
                warn!(frame = self.frame_count, detection = idx, "rejecting detection: {}", e);
                outcome.rejected += 1;
                continue;
            }
            if det.confidence < self.config.confidence_threshold {
                outcome.below_threshold += 1;
                continue;
            }
            kept.push(det);
            outcome.accepted.push(idx);
        }

        // 2. predict
        for track in self.tracks.values_mut() {
            track.predict(&self.kalman, self.config.motion_model);
        }

        // 3. associate, tracks in ascending id order
        let association = {
            let live: Vec<&Track> = self.tracks.values().collect();
            associate(&live, &kept, self.cost.as_ref(), self.config.cost_gate)
        };

        // 4. lifecycle
        for &(track_id, det_idx) in &association.matches {
            if let Some(track) = self.tracks.get_mut(&track_id) {
                track.update(
                    &self.kalman,
                    kept[det_idx],
                    self.config.n_init,
                    self.config.feature_smoothing,
                );
            }
        }
        for track_id in &association.unmatched_tracks {
            if let Some(track) = self.tracks.get_mut(track_id) {
                track.mark_missed(self.config.max_age);
            }
        }
        for &det_idx in &association.unmatched_detections {
            let id = self.next_id;
            self.next_id += 1;
            let track = Track::new(id, kept[det_idx], &self.kalman, self.config.n_init);
            self.tracks.insert(id, track);
            outcome.created.push(id);
        }

        self.tracks.retain(|&id, track| {
            if track.is_deleted() {
                outcome.deleted.push(id);
                false
            } else {
                true
            }
        });

        outcome.tracked = self.confirmed().collect();
        debug!(
            frame = self.frame_count,
            detections = detections.len(),
            accepted = kept.len(),
            matched = association.matches.len(),
            created = outcome.created.len(),
            deleted = outcome.deleted.len(),
            confirmed = outcome.tracked.len(),
            "frame processed"
        );
        outcome.association = association;
        outcome
    }

    fn confirmed(&self) -> impl Iterator<Item = TrackedObject> + '_ {
        self.tracks
            .values()
            .filter(|t| t.is_confirmed())
            .map(TrackedObject::from)
    }

    /// Live tracks, tentative ones included, ascending id.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn track(&self, id: u64) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Ids handed out so far, deleted tracks included.
    pub fn total_tracks_created(&self) -> u64 {
        self.next_id - 1
    }
}
