//! Detection pipeline controller.
//!
//! Reads frames in order, asks the oracle for each one, and folds the
//! resulting records into a `ResultDocument`. A single oracle failure aborts
//! the run; nothing is written in that case.

use crate::config::PipelineConfig;
use crate::document::{write_document, ResultDocument};
use crate::error::{PipelineError, Result};
use crate::ingest::{open_source, FrameSource};
use crate::oracle::{open_detection_oracle, DetectionOracle};
use crate::record::{build_frame_record, FrameRecord};
use crate::ui::FrameProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Init,
    Looping,
    EndOfStream,
    Finalizing,
}

pub struct DetectionPipeline<'a, O> {
    config: &'a PipelineConfig,
    oracle: O,
    progress: FrameProgress,
    phase: Phase,
}

impl<'a, O: DetectionOracle> DetectionPipeline<'a, O> {
    pub fn new(config: &'a PipelineConfig, oracle: O) -> Self {
        Self {
            config,
            oracle,
            progress: FrameProgress::logging("detect", config.progress_interval),
            phase: Phase::Init,
        }
    }

    pub fn with_progress(mut self, progress: FrameProgress) -> Self {
        self.progress = progress;
        self
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("detection pipeline: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Consume `source` and return the assembled document.
    pub fn run<S: FrameSource>(&mut self, mut source: S) -> Result<ResultDocument> {
        self.phase = Phase::Init;
        let fps = source.fps();
        if !(fps.is_finite() && fps > 0.0) {
            return Err(PipelineError::configuration(format!(
                "frame rate must be positive, got {fps}"
            )));
        }
        let config = self.config;
        let detection = &config.detection;
        log::info!(
            "detecting {:?} with oracle {} (confidence >= {})",
            detection.classes,
            self.oracle.name(),
            detection.confidence_threshold
        );
        self.progress.start(source.frame_count_hint());

        self.enter(Phase::Looping);
        let mut records: Vec<FrameRecord> = Vec::new();
        let mut frame_number = 0u64;
        while let Some(frame) = source.next_frame().map_err(|e| {
            PipelineError::stream_io(format!("failed to read frame {frame_number}: {e:#}"))
        })? {
            let raw = self
                .oracle
                .detect(&frame, detection.confidence_threshold, &detection.class_ids)
                .map_err(|e| PipelineError::oracle(frame_number, e))?;
            records.push(build_frame_record(&raw, frame_number, fps));
            frame_number += 1;
            self.progress.advance();
        }

        self.enter(Phase::EndOfStream);
        drop(source);
        self.progress.finish();

        self.enter(Phase::Finalizing);
        Ok(ResultDocument::assemble(detection.classes.clone(), records))
    }

    /// Run and write the document to the configured output path.
    pub fn run_to_file<S: FrameSource>(&mut self, source: S) -> Result<ResultDocument> {
        let doc = self.run(source)?;
        write_document(&self.config.output_json, &doc)?;
        Ok(doc)
    }
}

/// Open the configured source and oracle, run detection and write the document.
pub fn run_detection(config: &PipelineConfig, progress: FrameProgress) -> Result<ResultDocument> {
    let source = open_source(&config.input)?;
    let oracle = open_detection_oracle(config)?;
    DetectionPipeline::new(config, oracle)
        .with_progress(progress)
        .run_to_file(source)
}
