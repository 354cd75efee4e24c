use std::collections::BTreeSet;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::source::DetectionSource;
use crate::tracker::{TrackedObject, TrackerSession};

/// `(x1, y1, x2, y2, track_id)`, serialized as a JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackRecord(pub f32, pub f32, pub f32, pub f32, pub u64);

impl From<&TrackedObject> for TrackRecord {
    fn from(t: &TrackedObject) -> Self {
        TrackRecord(t.bbox.x1, t.bbox.y1, t.bbox.x2, t.bbox.y2, t.id)
    }
}

/// Tracker output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    pub frame: u64,
    pub tracks: Vec<TrackRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub frames: u64,
    pub detections: u64,
    pub rejected: u64,
    /// Distinct ids that were ever reported as confirmed
    pub unique_ids: u64,
    pub peak_confirmed: usize,
}

/// Frame loop: pull detections, update the tracker, hand results to a sink.
pub struct Pipeline<S> {
    source: S,
    session: TrackerSession,
}

impl<S: DetectionSource> Pipeline<S> {
    pub fn new(source: S, session: TrackerSession) -> Self {
        Self { source, session }
    }

    /// Run until the source is exhausted or `max_frames` frames were processed.
    pub fn run<F>(&mut self, max_frames: Option<u64>, mut sink: F) -> Result<PipelineStats>
    where
        F: FnMut(&FrameResult) -> Result<()>,
    {
        let mut stats = PipelineStats::default();
        let mut seen = BTreeSet::new();

        while max_frames.map_or(true, |max| stats.frames < max) {
            let Some(frame) = self.source.next_frame()? else {
                break;
            };

            let outcome = self.session.step(&frame.detections);
            stats.frames += 1;
            stats.detections += frame.detections.len() as u64;
            stats.rejected += outcome.rejected as u64;
            stats.peak_confirmed = stats.peak_confirmed.max(outcome.tracked.len());
            seen.extend(outcome.tracked.iter().map(|t| t.id));

            let result = FrameResult {
                frame: frame.index,
                tracks: outcome.tracked.iter().map(TrackRecord::from).collect(),
            };
            sink(&result)?;
        }

        stats.unique_ids = seen.len() as u64;
        info!(
            frames = stats.frames,
            detections = stats.detections,
            rejected = stats.rejected,
            unique_ids = stats.unique_ids,
            peak_confirmed = stats.peak_confirmed,
            "pipeline finished"
        );
        Ok(stats)
    }

    pub fn session(&self) -> &TrackerSession {
        &self.session
    }
}
