//! IoU association tracker.
//!
//! SORT-style online tracking without motion prediction: each frame's
//! detections are matched greedily to live tracks of the same class by
//! descending IoU, unmatched tracks age out after `max_age` frames, and
//! confident unmatched detections open new tracks.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

use super::{iou, DetectionOracle, RawDetection, TrackedDetection, TrackingOracle};
use crate::classes::COCO_CLASS_COUNT;
use crate::frame::Frame;

/// Detections below this never reach the tracker.
const DETECTION_FLOOR: f32 = 0.1;
const DEFAULT_NEW_TRACK_MIN_SCORE: f32 = 0.25;
const DEFAULT_MAX_AGE: u32 = 30;

#[derive(Clone, Debug)]
struct Tracklet {
    class_id: u32,
    bbox: [f32; 4],
    steps_since_update: u32,
}

/// Gives a detection oracle stable identities across frames.
pub struct IouTracker<D> {
    detector: D,
    iou_threshold: f32,
    max_age: u32,
    new_track_min_score: f32,
    allowed: BTreeSet<u32>,
    tracklets: BTreeMap<u64, Tracklet>,
    next_track_id: u64,
}

impl<D: DetectionOracle> IouTracker<D> {
    /// Track the output of `detector`; a detection continues a track only when
    /// their IoU is strictly above `iou_threshold`.
    pub fn new(detector: D, iou_threshold: f32) -> Self {
        Self {
            detector,
            iou_threshold,
            max_age: DEFAULT_MAX_AGE,
            new_track_min_score: DEFAULT_NEW_TRACK_MIN_SCORE,
            allowed: (0..COCO_CLASS_COUNT).collect(),
            tracklets: BTreeMap::new(),
            next_track_id: 1,
        }
    }

    /// Frames a track survives without a matching detection.
    pub fn with_max_age(mut self, max_age: u32) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn num_tracks(&self) -> usize {
        self.tracklets.len()
    }

    pub fn clear_tracks(&mut self) {
        self.tracklets.clear();
        self.next_track_id = 1;
    }

    /// Associate one frame of detections. Returns the track id per detection.
    fn update(&mut self, detections: &[RawDetection]) -> Vec<Option<u64>> {
        let mut pairs: Vec<(f32, usize, u64)> = Vec::new();
        for (det_idx, det) in detections.iter().enumerate() {
            for (track_id, track) in &self.tracklets {
                if track.class_id != det.class_id {
                    continue;
                }
                let overlap = iou(&det.bbox, &track.bbox);
                if overlap > self.iou_threshold {
                    pairs.push((overlap, det_idx, *track_id));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut assigned: Vec<Option<u64>> = vec![None; detections.len()];
        let mut matched_tracks = BTreeSet::new();
        for (_, det_idx, track_id) in pairs {
            if assigned[det_idx].is_some() || matched_tracks.contains(&track_id) {
                continue;
            }
            assigned[det_idx] = Some(track_id);
            matched_tracks.insert(track_id);
        }

        for (track_id, track) in self.tracklets.iter_mut() {
            if matched_tracks.contains(track_id) {
                track.steps_since_update = 0;
            } else {
                track.steps_since_update += 1;
            }
        }
        for (det_idx, track_id) in assigned.iter().enumerate() {
            if let Some(track) = track_id.and_then(|id| self.tracklets.get_mut(&id)) {
                track.bbox = detections[det_idx].bbox;
            }
        }
        let max_age = self.max_age;
        self.tracklets
            .retain(|_, track| track.steps_since_update <= max_age);

        for (det_idx, det) in detections.iter().enumerate() {
            if assigned[det_idx].is_some() || det.confidence < self.new_track_min_score {
                continue;
            }
            let id = self.next_track_id;
            self.next_track_id += 1;
            self.tracklets.insert(
                id,
                Tracklet {
                    class_id: det.class_id,
                    bbox: det.bbox,
                    steps_since_update: 0,
                },
            );
            assigned[det_idx] = Some(id);
        }
        assigned
    }
}

impl<D: DetectionOracle> TrackingOracle for IouTracker<D> {
    fn name(&self) -> &str {
        "iou-tracker"
    }

    fn track(&mut self, frame: &Frame, persist: bool) -> Result<Vec<TrackedDetection>> {
        if !persist {
            self.clear_tracks();
        }
        let detections = self.detector.detect(frame, DETECTION_FLOOR, &self.allowed)?;
        let ids = self.update(&detections);
        log::debug!(
            "IouTracker: {} detections, {} live tracks",
            detections.len(),
            self.tracklets.len()
        );
        Ok(detections
            .into_iter()
            .zip(ids)
            .map(|(det, identity)| TrackedDetection {
                class_id: det.class_id,
                confidence: det.confidence,
                bbox: det.bbox,
                identity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ReplayOracle;

    fn det(class_id: u32, confidence: f32, bbox: [f32; 4]) -> TrackedDetection {
        TrackedDetection {
            class_id,
            confidence,
            bbox,
            identity: None,
        }
    }

    fn ids(out: &[TrackedDetection]) -> Vec<Option<u64>> {
        out.iter().map(|d| d.identity).collect()
    }

    #[test]
    fn overlapping_boxes_keep_their_identity() {
        let frames = vec![
            vec![det(2, 0.9, [10.0, 10.0, 50.0, 50.0]), det(2, 0.8, [60.0, 60.0, 100.0, 100.0])],
            vec![det(2, 0.8, [62.0, 62.0, 102.0, 102.0]), det(2, 0.9, [12.0, 12.0, 52.0, 52.0])],
        ];
        let mut tracker = IouTracker::new(ReplayOracle::new(frames), 0.4);
        let frame = Frame::filled(4, 4, [0, 0, 0]);

        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(1), Some(2)]);
        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(2), Some(1)]);
    }

    #[test]
    fn low_overlap_or_other_class_opens_a_new_track() {
        let frames = vec![
            vec![det(2, 0.9, [0.0, 0.0, 10.0, 10.0])],
            // IoU with the first box is 0.3
            vec![det(2, 0.9, [0.0, 0.0, 10.0, 3.0])],
            vec![det(7, 0.9, [0.0, 0.0, 10.0, 3.0])],
        ];
        let mut tracker = IouTracker::new(ReplayOracle::new(frames), 0.4);
        let frame = Frame::filled(4, 4, [0, 0, 0]);

        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(1)]);
        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(2)]);
        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(3)]);
    }

    #[test]
    fn weak_unmatched_detections_stay_anonymous() {
        let frames = vec![vec![det(2, 0.2, [0.0, 0.0, 10.0, 10.0])]];
        let mut tracker = IouTracker::new(ReplayOracle::new(frames), 0.4);
        let out = tracker.track(&Frame::filled(4, 4, [0, 0, 0]), true).unwrap();
        assert_eq!(ids(&out), [None]);
        assert_eq!(tracker.num_tracks(), 0);
    }

    #[test]
    fn stale_tracks_expire_and_persist_false_resets() {
        let boxed = || vec![det(2, 0.9, [0.0, 0.0, 10.0, 10.0])];
        let frames = vec![boxed(), vec![], vec![], boxed(), boxed()];
        let mut tracker = IouTracker::new(ReplayOracle::new(frames), 0.4).with_max_age(1);
        let frame = Frame::filled(4, 4, [0, 0, 0]);

        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(1)]);
        tracker.track(&frame, true).unwrap();
        tracker.track(&frame, true).unwrap();
        assert_eq!(tracker.num_tracks(), 0);
        assert_eq!(ids(&tracker.track(&frame, true).unwrap()), [Some(2)]);
        assert_eq!(ids(&tracker.track(&frame, false).unwrap()), [Some(1)]);
    }
}
