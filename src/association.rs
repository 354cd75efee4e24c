use nalgebra::DMatrix;
use serde::Serialize;

use crate::assignment;
use crate::cost::CostFunction;
use crate::detection::Detection;
use crate::track::Track;

/// Outcome of matching one frame's detections against the live tracks.
///
/// Detection indices refer to the slice handed to [`associate`]. The three
/// lists partition the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Association {
    pub matches: Vec<(u64, usize)>,
    pub unmatched_tracks: Vec<u64>,
    pub unmatched_detections: Vec<usize>,
}

/// Pairwise costs, rows = tracks, cols = detections. Non-finite costs
/// become `+inf`.
pub fn cost_matrix(
    cost: &dyn CostFunction,
    tracks: &[&Track],
    detections: &[&Detection],
) -> DMatrix<f64> {
    DMatrix::from_fn(tracks.len(), detections.len(), |i, j| {
        let c = cost.cost(tracks[i], detections[j]);
        if c.is_finite() {
            c
        } else {
            f64::INFINITY
        }
    })
}

/// Match tracks to detections at minimum total cost, refusing any pair
/// costing more than `cost_gate`.
///
/// Tracks should be passed in ascending id order; ties in the solver go to
/// the earlier track, then the earlier detection.
pub fn associate(
    tracks: &[&Track],
    detections: &[&Detection],
    cost: &dyn CostFunction,
    cost_gate: f64,
) -> Association {
    if tracks.is_empty() || detections.is_empty() {
        return Association {
            matches: Vec::new(),
            unmatched_tracks: tracks.iter().map(|t| t.id()).collect(),
            unmatched_detections: (0..detections.len()).collect(),
        };
    }

    let costs = cost_matrix(cost, tracks, detections);

    // Anything past the gate costs the same just-over-gate value, so the
    // solver never trades a valid pair for an invalid one.
    let ceiling = cost_gate + 1e-5;
    let clipped = costs.map(|c| if c > cost_gate { ceiling } else { c });

    let mut track_matched = vec![false; tracks.len()];
    let mut det_matched = vec![false; detections.len()];
    let mut matches = Vec::new();

    for (row, col) in assignment::solve(&clipped) {
        let c = costs[(row, col)];
        if c > cost_gate {
            tracing::trace!(
                track = tracks[row].id(),
                detection = col,
                cost = c,
                "pair rejected by cost gate"
            );
            continue;
        }
        tracing::trace!(track = tracks[row].id(), detection = col, cost = c, "matched");
        track_matched[row] = true;
        det_matched[col] = true;
        matches.push((tracks[row].id(), col));
    }

    let unmatched_tracks = tracks
        .iter()
        .zip(&track_matched)
        .filter(|(_, &m)| !m)
        .map(|(t, _)| t.id())
        .collect();
    let unmatched_detections = det_matched
        .iter()
        .enumerate()
        .filter(|(_, &m)| !m)
        .map(|(j, _)| j)
        .collect();

    Association {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}
