//! Roadwatch
//!
//! Batch object detection and tracking over recorded road video.
//!
//! # Architecture
//!
//! Two independent pipelines share the frame sources and configuration:
//!
//! 1. **Detection**: frames are scored by a `DetectionOracle`, normalised into
//!    `FrameRecord`s, folded into `Statistics` and written as one JSON
//!    `ResultDocument`.
//! 2. **Tracking overlay**: frames are scored by a stateful `TrackingOracle`,
//!    filtered to vehicle classes, annotated with boxes and identity labels and
//!    written to a `VideoSink`.
//!
//! Model inference and multi-object tracking live behind the oracle traits;
//! this crate owns ordering, filtering, aggregation and serialization.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (local files, `stub://` synthetic streams)
//! - `oracle`: detection and tracking oracles (recorded replays, ONNX models)
//! - `record`, `stats`, `document`: per-frame records, statistics and the JSON document
//! - `pipeline`: detection controller
//! - `overlay`, `render`, `sink`: tracking overlay, drawing and video output

pub mod classes;
pub mod config;
pub mod document;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod oracle;
pub mod overlay;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod sink;
pub mod stats;
pub mod ui;

pub use config::{ConfigOverrides, DetectionSettings, PipelineConfig, TrackingSettings};
pub use document::{read_document, write_document, ResultDocument};
pub use error::{PipelineError, Result};
pub use frame::Frame;
pub use ingest::{open_source, FileConfig, FileSource, FrameSource};
pub use oracle::{
    open_detection_oracle, open_tracking_oracle, DetectionOracle, IouTracker, RawDetection,
    ReplayOracle, TrackedDetection, TrackingOracle,
};
pub use overlay::{frame_labels, run_tracking, OverlayLabel, OverlaySummary, TrackingOverlay};
pub use pipeline::{run_detection, DetectionPipeline};
pub use record::{build_frame_record, BoundingBox, Detection, FrameRecord};
pub use render::{Annotator, FrameAnnotator};
pub use sink::{open_sink, ImageSequenceSink, MemorySink, VideoSink};
pub use stats::{aggregate, ClassTally, Statistics};
