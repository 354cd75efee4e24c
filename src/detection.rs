use nalgebra::SVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned box in pixel coordinates, (x1, y1) top-left and (x2, y2) bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Convert to the `[x, y, w, h]` measurement used by the Kalman filter.
    pub fn to_tlwh(&self) -> SVector<f32, 4> {
        SVector::<f32, 4>::new(self.x1, self.y1, self.width(), self.height())
    }

    /// Convert from `[x, y, w, h]`. Sizes are clamped so the box never inverts.
    pub fn from_tlwh(tlwh: &SVector<f32, 4>) -> Self {
        let w = tlwh[2].max(f32::EPSILON);
        let h = tlwh[3].max(f32::EPSILON);
        Self::new(tlwh[0], tlwh[1], tlwh[0] + w, tlwh[1] + h)
    }

    fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// Why a detection was refused before association.
#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("non-finite box coordinate in {0:?}")]
    NonFinite(BBox),
    #[error("degenerate box {0:?}: x2 must exceed x1 and y2 must exceed y1")]
    Degenerate(BBox),
    #[error("confidence {0} outside [0, 1]")]
    Confidence(f32),
    #[error("non-finite value in appearance embedding")]
    NonFiniteEmbedding,
}

/// A single detector output for one frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawDetection")]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    /// Appearance embedding, when the detector provides one.
    pub embedding: Option<Vec<f32>>,
}

impl Detection {
    pub fn new(bbox: BBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            embedding: None,
        }
    }

    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self::new(BBox::new(x1, y1, x2, y2), confidence)
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.bbox.is_finite() {
            return Err(DetectionError::NonFinite(self.bbox));
        }
        if self.bbox.x2 <= self.bbox.x1 || self.bbox.y2 <= self.bbox.y1 {
            return Err(DetectionError::Degenerate(self.bbox));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectionError::Confidence(self.confidence));
        }
        if let Some(embedding) = &self.embedding {
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(DetectionError::NonFiniteEmbedding);
            }
        }
        Ok(())
    }
}

/// Accepted wire shapes: `[x1, y1, x2, y2, conf]` or an object with a `bbox` array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDetection {
    Tuple([f32; 5]),
    Object {
        bbox: [f32; 4],
        confidence: f32,
        #[serde(default)]
        embedding: Option<Vec<f32>>,
    },
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        match raw {
            RawDetection::Tuple([x1, y1, x2, y2, conf]) => Detection::from_xyxy(x1, y1, x2, y2, conf),
            RawDetection::Object {
                bbox: [x1, y1, x2, y2],
                confidence,
                embedding,
            } => Detection {
                bbox: BBox::new(x1, y1, x2, y2),
                confidence,
                embedding,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Detection::from_xyxy(10.0, 10.0, 50.0, 50.0, 0.9).validate().is_ok());
        assert!(matches!(
            Detection::from_xyxy(50.0, 10.0, 50.0, 60.0, 0.9).validate(),
            Err(DetectionError::Degenerate(_))
        ));
        assert!(matches!(
            Detection::from_xyxy(10.0, 60.0, 50.0, 20.0, 0.9).validate(),
            Err(DetectionError::Degenerate(_))
        ));
        assert_eq!(
            Detection::from_xyxy(10.0, 10.0, 50.0, 50.0, 1.2).validate(),
            Err(DetectionError::Confidence(1.2))
        );
        assert!(matches!(
            Detection::from_xyxy(f32::NAN, 10.0, 50.0, 50.0, 0.5).validate(),
            Err(DetectionError::NonFinite(_))
        ));
    }

    #[test]
    fn test_validate_embedding() {
        let det = Detection::from_xyxy(10.0, 10.0, 50.0, 50.0, 0.9);
        assert!(det.clone().with_embedding(vec![0.3, -0.7]).validate().is_ok());
        assert_eq!(
            det.clone().with_embedding(vec![1.0, f32::NAN]).validate(),
            Err(DetectionError::NonFiniteEmbedding)
        );
        assert_eq!(
            det.with_embedding(vec![f32::INFINITY, 0.0]).validate(),
            Err(DetectionError::NonFiniteEmbedding)
        );
    }

    #[test]
    fn test_tlwh_conversion() {
        let b = BBox::new(100.0, 100.0, 150.0, 180.0);
        let tlwh = b.to_tlwh();
        assert_eq!(tlwh, SVector::<f32, 4>::new(100.0, 100.0, 50.0, 80.0));
        assert_eq!(BBox::from_tlwh(&tlwh), b);
    }

    #[test]
    fn test_deserialize_both_shapes() {
        let dets: Vec<Detection> = serde_json::from_str(
            r#"[[1, 2, 3, 4, 0.5], {"bbox": [5, 6, 7, 8], "confidence": 0.7, "embedding": [1.0, 0.0]}]"#,
        )
        .unwrap();
        assert_eq!(dets[0], Detection::from_xyxy(1.0, 2.0, 3.0, 4.0, 0.5));
        assert_eq!(dets[1].bbox, BBox::new(5.0, 6.0, 7.0, 8.0));
        assert_eq!(dets[1].embedding.as_deref(), Some(&[1.0, 0.0][..]));
    }
}
