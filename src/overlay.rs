//! Tracking overlay renderer.
//!
//! Every source frame is tracked, annotated with the surviving boxes, and
//! written to the sink in order. Frames are never dropped: a frame whose
//! tracker output carries no identities at all goes out untouched.

use crate::classes::coco_label;
use crate::config::{PipelineConfig, TrackingSettings};
use crate::error::{PipelineError, Result};
use crate::ingest::{open_source, FrameSource};
use crate::oracle::{open_tracking_oracle, TrackedDetection, TrackingOracle};
use crate::render::{Annotator, FrameAnnotator};
use crate::sink::{open_sink, VideoSink};
use crate::ui::FrameProgress;

/// One box to draw, with its display text.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLabel {
    /// `[x1, y1, x2, y2]` truncated to whole pixels.
    pub rect: [i32; 4],
    pub text: String,
    pub class_id: u32,
    pub identity: u64,
    pub confidence: f32,
}

/// Counters reported after a tracking run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlaySummary {
    pub frames_written: u64,
    /// Frames that received at least one label.
    pub frames_annotated: u64,
    pub labels_drawn: u64,
}

/// Labels for one frame.
///
/// `None` when no detection carries an identity; the frame is then passed
/// through unannotated. Otherwise detections without an identity, outside the
/// configured classes, or not strictly above the threshold are dropped.
pub fn frame_labels(
    detections: &[TrackedDetection],
    settings: &TrackingSettings,
) -> Option<Vec<OverlayLabel>> {
    if detections.iter().all(|d| d.identity.is_none()) {
        return None;
    }
    let labels = detections
        .iter()
        .filter(|d| settings.class_ids.contains(&d.class_id))
        .filter(|d| d.confidence > settings.confidence_threshold)
        .filter_map(|d| {
            let identity = d.identity?;
            let [x1, y1, x2, y2] = d.bbox;
            Some(OverlayLabel {
                rect: [x1 as i32, y1 as i32, x2 as i32, y2 as i32],
                text: format!("{} {} ({:.2})", coco_label(d.class_id), identity, d.confidence),
                class_id: d.class_id,
                identity,
                confidence: d.confidence,
            })
        })
        .collect();
    Some(labels)
}

pub struct TrackingOverlay<'a, O, A = FrameAnnotator> {
    settings: &'a TrackingSettings,
    oracle: O,
    annotator: A,
    progress: FrameProgress,
}

impl<'a, O: TrackingOracle> TrackingOverlay<'a, O, FrameAnnotator> {
    pub fn new(settings: &'a TrackingSettings, oracle: O) -> Self {
        Self {
            settings,
            oracle,
            annotator: FrameAnnotator::new(),
            progress: FrameProgress::logging("track", 0),
        }
    }
}

impl<'a, O: TrackingOracle, A: Annotator> TrackingOverlay<'a, O, A> {
    pub fn with_annotator<B: Annotator>(self, annotator: B) -> TrackingOverlay<'a, O, B> {
        TrackingOverlay {
            settings: self.settings,
            oracle: self.oracle,
            annotator,
            progress: self.progress,
        }
    }

    pub fn with_progress(mut self, progress: FrameProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Track, annotate and write every frame of `source`, then finish the sink.
    pub fn run<S: FrameSource, K: VideoSink>(
        &mut self,
        mut source: S,
        sink: &mut K,
    ) -> Result<OverlaySummary> {
        log::info!("tracking with oracle {}", self.oracle.name());
        self.progress.start(source.frame_count_hint());
        let mut summary = OverlaySummary::default();
        let mut index = 0u64;

        while let Some(mut frame) = source.next_frame().map_err(|e| {
            PipelineError::stream_io(format!("failed to read frame {index}: {e:#}"))
        })? {
            let tracked = self
                .oracle
                .track(&frame, true)
                .map_err(|e| PipelineError::oracle(index, e))?;

            match frame_labels(&tracked, self.settings) {
                Some(labels) => {
                    for label in &labels {
                        self.annotator.annotate(&mut frame, label).map_err(|e| {
                            PipelineError::stream_io(format!(
                                "failed to annotate frame {index}: {e:#}"
                            ))
                        })?;
                    }
                    if !labels.is_empty() {
                        summary.frames_annotated += 1;
                        summary.labels_drawn += labels.len() as u64;
                    }
                }
                None => log::debug!("frame {index}: no track identities, passing through"),
            }

            sink.write_frame(&frame).map_err(|e| {
                PipelineError::stream_io(format!("failed to write frame {index}: {e:#}"))
            })?;
            summary.frames_written += 1;
            index += 1;
            self.progress.advance();
        }

        drop(source);
        sink.finish()
            .map_err(|e| PipelineError::stream_io(format!("failed to finish video: {e:#}")))?;
        self.progress.finish();
        Ok(summary)
    }
}

/// Open the configured source, tracker and video sink and run the overlay.
pub fn run_tracking(config: &PipelineConfig, progress: FrameProgress) -> Result<OverlaySummary> {
    let source = open_source(&config.input)?;
    let oracle = open_tracking_oracle(config)?;
    let (width, height) = source.frame_size();
    let mut sink = open_sink(&config.output_video, source.fps(), width, height)?;
    TrackingOverlay::new(&config.tracking, oracle)
        .with_progress(progress)
        .run(source, &mut sink)
}
