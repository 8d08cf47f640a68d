use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use super::{DetectionOracle, RawDetection, TrackedDetection, TrackingOracle};
use crate::error::PipelineError;
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct Recording {
    frames: Vec<Vec<TrackedDetection>>,
}

/// Replays previously recorded oracle output, one recorded frame per call.
///
/// The recording holds the unfiltered model output. As a detection oracle it
/// applies the threshold and allow-list itself; as a tracking oracle it hands
/// back recorded identities untouched.
pub struct ReplayOracle {
    frames: Vec<Vec<TrackedDetection>>,
    cursor: usize,
}

impl ReplayOracle {
    pub fn new(frames: Vec<Vec<TrackedDetection>>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Load a recording of the form `{"frames": [[{class_id, confidence, bbox, id?}, ...], ...]}`.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration(format!(
                "failed to read recording {}: {}",
                path.display(),
                e
            ))
        })?;
        let recording: Recording = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::configuration(format!("invalid recording {}: {}", path.display(), e))
        })?;
        log::info!(
            "ReplayOracle: loaded {} recorded frames from {}",
            recording.frames.len(),
            path.display()
        );
        Ok(Self::new(recording.frames))
    }

    fn next_entries(&mut self) -> Result<&[TrackedDetection]> {
        let idx = self.cursor;
        let entries = self.frames.get(idx).ok_or_else(|| {
            anyhow!(
                "recording has {} frames; no output for frame {}",
                self.frames.len(),
                idx
            )
        })?;
        self.cursor += 1;
        Ok(entries)
    }
}

impl DetectionOracle for ReplayOracle {
    fn name(&self) -> &str {
        "replay"
    }

    fn detect(
        &mut self,
        _frame: &Frame,
        threshold: f32,
        allowed: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        let entries = self.next_entries()?;
        Ok(entries
            .iter()
            .filter(|d| d.confidence >= threshold && allowed.contains(&d.class_id))
            .map(|d| RawDetection {
                class_id: d.class_id,
                confidence: d.confidence,
                bbox: d.bbox,
            })
            .collect())
    }
}

impl TrackingOracle for ReplayOracle {
    fn name(&self) -> &str {
        "replay"
    }

    fn track(&mut self, _frame: &Frame, persist: bool) -> Result<Vec<TrackedDetection>> {
        if !persist {
            log::debug!("ReplayOracle: recorded identities ignore persist=false");
        }
        Ok(self.next_entries()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(class_id: u32, confidence: f32, id: Option<u64>) -> TrackedDetection {
        TrackedDetection {
            class_id,
            confidence,
            bbox: [0.0, 0.0, 4.0, 4.0],
            identity: id,
        }
    }

    #[test]
    fn detect_threshold_is_inclusive() {
        let mut oracle = ReplayOracle::new(vec![vec![
            entry(0, 0.5, None),
            entry(0, 0.49, None),
            entry(2, 0.8, None),
            entry(7, 0.9, None),
        ]]);
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        let out = oracle
            .detect(&frame, 0.5, &BTreeSet::from([0, 2]))
            .unwrap();
        let kept: Vec<_> = out.iter().map(|d| (d.class_id, d.confidence)).collect();
        assert_eq!(kept, [(0, 0.5), (2, 0.8)]);
    }

    #[test]
    fn running_past_recording_fails() {
        let mut oracle = ReplayOracle::new(vec![vec![]]);
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        assert!(oracle.track(&frame, true).is_ok());
        let err = oracle.track(&frame, true).unwrap_err();
        assert!(err.to_string().contains("no output for frame 1"));
    }

    #[test]
    fn track_returns_recorded_identities() {
        let mut oracle = ReplayOracle::new(vec![vec![entry(2, 0.62, Some(7)), entry(3, 0.7, None)]]);
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        let out = oracle.track(&frame, true).unwrap();
        assert_eq!(out[0].identity, Some(7));
        assert_eq!(out[1].identity, None);
    }
}
