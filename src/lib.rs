pub mod assignment;
pub mod association;
pub mod config;
pub mod cost;
pub mod detection;
pub mod kalman_filter;
pub mod pipeline;
pub mod source;
pub mod track;
pub mod tracker;
pub mod utils;

// Re-export main types
pub use crate::config::{ConfigError, TrackerConfig};
pub use crate::cost::{AppearanceCost, CostFunction, HybridCost, IouCost, MotionGate};
pub use crate::detection::{BBox, Detection, DetectionError};
pub use crate::pipeline::{FrameResult, Pipeline, PipelineStats, TrackRecord};
pub use crate::source::{DetectionSource, Frame, JsonLinesSource, VecSource};
pub use crate::track::{Track, TrackState};
pub use crate::tracker::{StepOutcome, TrackedObject, TrackerSession};
