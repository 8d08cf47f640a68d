//! Detection and tracking oracles.
//!
//! The pipeline never runs a model itself. It talks to an oracle through one
//! of the two traits below, which keeps the model swappable and lets tests
//! drive the controllers with scripted output.
//!
//! - `ReplayOracle`: recorded oracle output, one entry per frame
//! - `TractYoloOracle`: YOLOv8 ONNX model on tract (feature: backend-tract)
//! - `IouTracker`: identities for any detection oracle by IoU association

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::frame::Frame;

mod iou_tracker;
mod replay;
#[cfg(feature = "backend-tract")]
mod tract;

pub use iou_tracker::IouTracker;
pub use replay::ReplayOracle;
#[cfg(feature = "backend-tract")]
pub use tract::TractYoloOracle;

/// One scored box as emitted by a detection oracle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f32; 4],
}

/// One scored box from a tracking oracle, with its track id when associated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: [f32; 4],
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub identity: Option<u64>,
}

/// Stateless per-call scoring.
pub trait DetectionOracle {
    /// Oracle identifier for logs.
    fn name(&self) -> &str;

    /// Score one frame.
    ///
    /// Implementations return only boxes with `confidence >= threshold` whose
    /// class is in `allowed`. Emission order is kept by the caller.
    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f32,
        allowed: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>>;
}

/// Stateful tracking across calls on one stream.
///
/// Identities are issued by the implementation; callers never assign or
/// rewrite them.
pub trait TrackingOracle {
    fn name(&self) -> &str;

    /// Score one frame, carrying track state over from previous calls when `persist` is set.
    fn track(&mut self, frame: &Frame, persist: bool) -> Result<Vec<TrackedDetection>>;
}

impl<T: DetectionOracle + ?Sized> DetectionOracle for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f32,
        allowed: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        (**self).detect(frame, threshold, allowed)
    }
}

impl<T: TrackingOracle + ?Sized> TrackingOracle for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn track(&mut self, frame: &Frame, persist: bool) -> Result<Vec<TrackedDetection>> {
        (**self).track(frame, persist)
    }
}

enum ModelKind {
    Replay,
    Onnx,
}

fn model_kind(model: &Path) -> crate::Result<ModelKind> {
    if !model.exists() {
        return Err(PipelineError::configuration(format!(
            "model artifact {} does not exist",
            model.display()
        )));
    }
    match model
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("json") => Ok(ModelKind::Replay),
        Some("onnx") => Ok(ModelKind::Onnx),
        _ => Err(PipelineError::configuration(format!(
            "unsupported model artifact {} (expected .onnx or .json)",
            model.display()
        ))),
    }
}

/// Open the detection oracle named by `config.model`.
pub fn open_detection_oracle(config: &PipelineConfig) -> crate::Result<Box<dyn DetectionOracle>> {
    match model_kind(&config.model)? {
        ModelKind::Replay => Ok(Box::new(ReplayOracle::load(&config.model)?)),
        ModelKind::Onnx => open_onnx(config, config.detection.nms_iou_threshold),
    }
}

/// Open the tracking oracle named by `config.model`.
///
/// A `.json` recording is replayed with its recorded identities; an `.onnx`
/// model is run per frame and tracked by IoU association.
pub fn open_tracking_oracle(config: &PipelineConfig) -> crate::Result<Box<dyn TrackingOracle>> {
    match model_kind(&config.model)? {
        ModelKind::Replay => Ok(Box::new(ReplayOracle::load(&config.model)?)),
        ModelKind::Onnx => {
            let detector = open_onnx(config, config.tracking.iou_threshold)?;
            Ok(Box::new(IouTracker::new(detector, config.tracking.iou_threshold)))
        }
    }
}

#[cfg(feature = "backend-tract")]
fn open_onnx(config: &PipelineConfig, nms_iou: f32) -> crate::Result<Box<dyn DetectionOracle>> {
    let oracle = TractYoloOracle::new(&config.model, config.inference_size, nms_iou)
        .map_err(|e| PipelineError::configuration(format!("{e:#}")))?;
    Ok(Box::new(oracle))
}

#[cfg(not(feature = "backend-tract"))]
fn open_onnx(config: &PipelineConfig, _nms_iou: f32) -> crate::Result<Box<dyn DetectionOracle>> {
    Err(PipelineError::configuration(format!(
        "{} needs the backend-tract feature",
        config.model.display()
    )))
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes.
pub(crate) fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
