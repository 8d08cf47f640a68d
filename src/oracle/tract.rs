#![cfg(feature = "backend-tract")]

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use super::{iou, DetectionOracle, RawDetection};
use crate::frame::Frame;

const BOX_OFFSET: usize = 4;

/// YOLOv8 detection head on tract.
///
/// Expects a model exported with a fixed `1x3xSxS` input and the usual
/// `[1, 4 + classes, anchors]` output. Frames are stretched to `SxS`; boxes
/// are scaled back to frame pixels.
pub struct TractYoloOracle {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    nms_iou: f32,
}

impl TractYoloOracle {
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, nms_iou: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractYoloOracle: loaded {} at {}x{}",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            input_size,
            nms_iou,
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = imageops::resize(
            frame.image(),
            self.input_size,
            self.input_size,
            FilterType::Triangle,
        );
        let size = self.input_size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(
        &self,
        output: &Tensor,
        frame: &Frame,
        threshold: f32,
        allowed: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= BOX_OFFSET {
            return Err(anyhow!("unexpected YOLOv8 output shape {:?}", shape));
        }
        let (rows, anchors) = (shape[1], shape[2]);
        let sx = frame.width() as f32 / self.input_size as f32;
        let sy = frame.height() as f32 / self.input_size as f32;
        let (max_x, max_y) = (frame.width() as f32, frame.height() as f32);

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let (class_id, confidence) = (BOX_OFFSET..rows)
                .map(|row| (row - BOX_OFFSET, view[[0, row, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            let class_id = class_id as u32;
            if confidence < threshold || !allowed.contains(&class_id) {
                continue;
            }
            let cx = view[[0, 0, anchor]] * sx;
            let cy = view[[0, 1, anchor]] * sy;
            let w = view[[0, 2, anchor]] * sx;
            let h = view[[0, 3, anchor]] * sy;
            candidates.push(RawDetection {
                class_id,
                confidence,
                bbox: [
                    (cx - w / 2.0).clamp(0.0, max_x),
                    (cy - h / 2.0).clamp(0.0, max_y),
                    (cx + w / 2.0).clamp(0.0, max_x),
                    (cy + h / 2.0).clamp(0.0, max_y),
                ],
            });
        }

        Ok(non_max_suppression(candidates, self.nms_iou))
    }
}

impl DetectionOracle for TractYoloOracle {
    fn name(&self) -> &str {
        "tract-yolov8"
    }

    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f32,
        allowed: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        self.decode(output, frame, threshold, allowed)
    }
}

/// Greedy per-class NMS; survivors come back in descending confidence.
fn non_max_suppression(mut boxes: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
