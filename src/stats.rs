//! Aggregate counters over a run's frame records.
//!
//! `Statistics` is only ever produced by `aggregate`, a single pass over the
//! full record sequence. Nothing increments counters incrementally, so the
//! counters cannot drift from the records they describe.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::record::FrameRecord;

const DETECTIONS_SUFFIX: &str = "_detections";
const FRAMES_WITH_PREFIX: &str = "frames_with_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassTally {
    pub class_name: String,
    /// Detections of this class across all frames.
    pub detections: u64,
    /// Frames containing at least one detection of this class.
    pub frames_with: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Statistics {
    pub total_frames: u64,
    /// One entry per tracked class, in configured order.
    pub classes: Vec<ClassTally>,
}

impl Statistics {
    pub fn tally(&self, class_name: &str) -> Option<&ClassTally> {
        self.classes.iter().find(|t| t.class_name == class_name)
    }

    pub fn detections_of(&self, class_name: &str) -> u64 {
        self.tally(class_name).map_or(0, |t| t.detections)
    }

    pub fn frames_with(&self, class_name: &str) -> u64 {
        self.tally(class_name).map_or(0, |t| t.frames_with)
    }
}

/// Fold frame records into statistics for the given tracked classes.
///
/// Detections of classes outside `tracked` are ignored. Deterministic for a
/// given input; O(total detections).
pub fn aggregate<S: AsRef<str>>(records: &[FrameRecord], tracked: &[S]) -> Statistics {
    let mut classes: Vec<ClassTally> = tracked
        .iter()
        .map(|name| ClassTally {
            class_name: name.as_ref().to_string(),
            detections: 0,
            frames_with: 0,
        })
        .collect();
    let mut seen = vec![false; classes.len()];

    for record in records {
        seen.iter_mut().for_each(|flag| *flag = false);
        for detection in &record.detections {
            if let Some(idx) = classes
                .iter()
                .position(|t| t.class_name == detection.class_name)
            {
                classes[idx].detections += 1;
                seen[idx] = true;
            }
        }
        for (tally, hit) in classes.iter_mut().zip(&seen) {
            if *hit {
                tally.frames_with += 1;
            }
        }
    }

    Statistics {
        total_frames: records.len() as u64,
        classes,
    }
}

impl Serialize for Statistics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.classes.len() * 2))?;
        map.serialize_entry("total_frames", &self.total_frames)?;
        for tally in &self.classes {
            map.serialize_entry(
                &format!("{}{}", tally.class_name, DETECTIONS_SUFFIX),
                &tally.detections,
            )?;
        }
        for tally in &self.classes {
            map.serialize_entry(
                &format!("{}{}", FRAMES_WITH_PREFIX, tally.class_name),
                &tally.frames_with,
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Statistics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StatisticsVisitor)
    }
}

struct StatisticsVisitor;

impl<'de> Visitor<'de> for StatisticsVisitor {
    type Value = Statistics;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a statistics map with total_frames and per-class counters")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Statistics, A::Error> {
        let mut total_frames = None;
        let mut counters: Vec<(String, u64)> = Vec::new();

        while let Some(key) = access.next_key::<String>()? {
            let value: u64 = access.next_value()?;
            if key == "total_frames" {
                if total_frames.replace(value).is_some() {
                    return Err(de::Error::duplicate_field("total_frames"));
                }
                continue;
            }
            if counters.iter().any(|(k, _)| *k == key) {
                return Err(de::Error::custom(format!("duplicate statistics key '{key}'")));
            }
            counters.push((key, value));
        }

        let total_frames = total_frames
            .ok_or_else(|| <A::Error as de::Error>::missing_field("total_frames"))?;
        let classes = pair_counters(&counters).map_err(<A::Error as de::Error>::custom)?;
        Ok(Statistics {
            total_frames,
            classes,
        })
    }
}

/// Pair `<name>_detections` with `frames_with_<name>` counters.
///
/// Class names may themselves contain the suffix or prefix, so a key is never
/// classified on its own. The serialized layout (all detection counters, then
/// all frame counters, in class order) is tried first; otherwise each
/// detection counter claims its frame counter in order of appearance.
fn pair_counters(counters: &[(String, u64)]) -> Result<Vec<ClassTally>, String> {
    if let Some(classes) = pair_in_layout(counters) {
        return Ok(classes);
    }

    let mut used = vec![false; counters.len()];
    let mut classes = Vec::new();
    for (i, (key, detections)) in counters.iter().enumerate() {
        if used[i] {
            continue;
        }
        let Some(name) = key.strip_suffix(DETECTIONS_SUFFIX) else {
            continue;
        };
        let partner = format!("{FRAMES_WITH_PREFIX}{name}");
        let found = counters
            .iter()
            .enumerate()
            .position(|(j, (k, _))| j != i && !used[j] && *k == partner);
        if let Some(j) = found {
            used[i] = true;
            used[j] = true;
            classes.push(ClassTally {
                class_name: name.to_string(),
                detections: *detections,
                frames_with: counters[j].1,
            });
        }
    }

    match counters.iter().zip(&used).find(|(_, used)| !**used) {
        Some(((key, _), _)) => Err(format!(
            "statistics key '{key}' has no matching detection or frame counter"
        )),
        None => Ok(classes),
    }
}

fn pair_in_layout(counters: &[(String, u64)]) -> Option<Vec<ClassTally>> {
    if counters.len() % 2 != 0 {
        return None;
    }
    let (detections, frames) = counters.split_at(counters.len() / 2);
    detections
        .iter()
        .zip(frames)
        .map(|((det_key, det_value), (frames_key, frames_value))| {
            let name = det_key.strip_suffix(DETECTIONS_SUFFIX)?;
            (frames_key.strip_prefix(FRAMES_WITH_PREFIX)? == name).then(|| ClassTally {
                class_name: name.to_string(),
                detections: *det_value,
                frames_with: *frames_value,
            })
        })
        .collect()
}
