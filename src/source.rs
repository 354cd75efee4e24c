use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::detection::Detection;

/// One frame's worth of detector output.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub detections: Vec<Detection>,
}

/// Pull-based producer of detection frames, in strict frame order.
pub trait DetectionSource {
    /// `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Frames held in memory.
#[derive(Debug, Clone)]
pub struct VecSource {
    frames: std::vec::IntoIter<Frame>,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }

    /// Number frames 0, 1, 2, ... in the given order.
    pub fn from_detections(per_frame: Vec<Vec<Detection>>) -> Self {
        Self::new(
            per_frame
                .into_iter()
                .enumerate()
                .map(|(i, detections)| Frame {
                    index: i as u64,
                    detections,
                })
                .collect(),
        )
    }
}

impl DetectionSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.next())
    }
}

#[derive(Deserialize)]
struct FrameRecord {
    #[serde(default)]
    frame: Option<u64>,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Reads one JSON object per line:
/// `{"frame": 0, "detections": [[x1, y1, x2, y2, conf], ...]}`.
///
/// `frame` may be omitted, in which case lines are numbered consecutively.
/// Blank lines are skipped. Frame numbers must strictly increase.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
    last_index: Option<u64>,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening detections {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            last_index: None,
        }
    }
}

impl<R: BufRead> DetectionSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("reading line {}", self.line_no))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: FrameRecord = serde_json::from_str(&line)
                .with_context(|| format!("parsing detections on line {}", self.line_no))?;

            let index = match (record.frame, self.last_index) {
                (Some(i), Some(last)) if i <= last => bail!(
                    "frame {} on line {} does not follow frame {}",
                    i,
                    self.line_no,
                    last
                ),
                (Some(i), _) => i,
                (None, Some(last)) => match last.checked_add(1) {
                    Some(i) => i,
                    None => bail!("frame number overflows after line {}", self.line_no - 1),
                },
                (None, None) => 0,
            };
            self.last_index = Some(index);
            return Ok(Some(Frame {
                index,
                detections: record.detections,
            }));
        }
        Ok(None)
    }
}
