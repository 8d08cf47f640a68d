//! Canonical per-frame detection records.
//!
//! `build_frame_record` is the only producer of `FrameRecord`s. It is a pure
//! function of the oracle output, the frame index and the stream rate.

use serde::{Deserialize, Serialize};

use crate::classes;
use crate::oracle::RawDetection;

/// Axis-aligned pixel rectangle with `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "BoundingBoxRepr", try_from = "BoundingBoxRepr")]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    /// Corners may arrive in either order; they are normalised here.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn from_corners(corners: [f32; 4]) -> Self {
        Self::new(corners[0], corners[1], corners[2], corners[3])
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct BoundingBoxRepr {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    width: f32,
    height: f32,
}

impl From<BoundingBox> for BoundingBoxRepr {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            x1: bbox.x1,
            y1: bbox.y1,
            x2: bbox.x2,
            y2: bbox.y2,
            width: bbox.width(),
            height: bbox.height(),
        }
    }
}

// width/height are derived; the stored values are not trusted on read.
impl TryFrom<BoundingBoxRepr> for BoundingBox {
    type Error = String;

    fn try_from(repr: BoundingBoxRepr) -> Result<Self, Self::Error> {
        if repr.x1 > repr.x2 || repr.y1 > repr.y2 {
            return Err(format!(
                "bbox corners out of order: ({}, {}) -> ({}, {})",
                repr.x1, repr.y1, repr.x2, repr.y2
            ));
        }
        Ok(Self {
            x1: repr.x1,
            y1: repr.y1,
            x2: repr.x2,
            y2: repr.y2,
        })
    }
}

/// One observed object in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_name: String,
    pub class_id: u32,
}

impl Detection {
    fn from_raw(raw: &RawDetection) -> Self {
        Self {
            bbox: BoundingBox::from_corners(raw.bbox),
            confidence: raw.confidence,
            class_name: classes::class_name(raw.class_id).into_owned(),
            class_id: raw.class_id,
        }
    }
}

/// All detections for one input frame. Present even when `detections` is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_number: u64,
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

/// Seconds from stream start for a 0-based frame index.
pub fn frame_timestamp(frame_number: u64, fps: f64) -> f64 {
    frame_number as f64 / fps
}

/// Normalise one frame of oracle output into a `FrameRecord`.
///
/// Emission order is preserved and nothing is dropped, rescored or merged.
pub fn build_frame_record(raw: &[RawDetection], frame_number: u64, fps: f64) -> FrameRecord {
    FrameRecord {
        frame_number,
        timestamp: frame_timestamp(frame_number, fps),
        detections: raw.iter().map(Detection::from_raw).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(class_id: u32, confidence: f32, bbox: [f32; 4]) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox,
        }
    }

    #[test]
    fn builds_record_with_derived_geometry() {
        let record = build_frame_record(&[raw(0, 0.91, [10.0, 20.0, 50.0, 100.0])], 4, 8.0);
        assert_eq!(record.frame_number, 4);
        assert_eq!(record.timestamp, 0.5);
        let det = &record.detections[0];
        assert_eq!(det.class_name, "person");
        assert_eq!(det.bbox.width(), 40.0);
        assert_eq!(det.bbox.height(), 80.0);
    }

    #[test]
    fn keeps_oracle_order_and_duplicates() {
        let boxes = [
            raw(2, 0.7, [0.0, 0.0, 5.0, 5.0]),
            raw(0, 0.6, [1.0, 1.0, 2.0, 2.0]),
            raw(2, 0.7, [0.0, 0.0, 5.0, 5.0]),
        ];
        let record = build_frame_record(&boxes, 0, 25.0);
        let names: Vec<_> = record
            .detections
            .iter()
            .map(|d| d.class_name.as_str())
            .collect();
        assert_eq!(names, ["car", "person", "car"]);
    }

    #[test]
    fn unmapped_class_gets_synthetic_name() {
        let record = build_frame_record(&[raw(99, 0.8, [0.0, 0.0, 1.0, 1.0])], 0, 30.0);
        assert_eq!(record.detections[0].class_name, "class_99");
        assert_eq!(record.detections[0].class_id, 99);
    }

    #[test]
    fn empty_frame_still_produces_record() {
        let record = build_frame_record(&[], 7, 10.0);
        assert!(record.detections.is_empty());
        assert!((record.timestamp - 0.7).abs() < 1e-12);
    }

    #[test]
    fn swapped_corners_are_normalised() {
        let bbox = BoundingBox::new(30.0, 40.0, 10.0, 5.0);
        assert_eq!((bbox.x1(), bbox.y1(), bbox.x2(), bbox.y2()), (10.0, 5.0, 30.0, 40.0));
    }

    #[test]
    fn detection_serialises_with_schema_keys() {
        let record = build_frame_record(&[raw(2, 0.5, [1.0, 2.0, 4.0, 8.0])], 0, 1.0);
        let value = serde_json::to_value(&record.detections[0]).unwrap();
        assert_eq!(value["class"], "car");
        assert_eq!(value["class_id"], 2);
        assert_eq!(value["bbox"]["width"], 3.0);
        assert_eq!(value["bbox"]["height"], 6.0);
    }

    #[test]
    fn out_of_order_corners_fail_to_parse() {
        let json = r#"{"x1": 5.0, "y1": 0.0, "x2": 1.0, "y2": 1.0, "width": -4.0, "height": 1.0}"#;
        assert!(serde_json::from_str::<BoundingBox>(json).is_err());
    }
}
