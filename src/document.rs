//! Result document and its serializer.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::record::FrameRecord;
use crate::stats::{aggregate, Statistics};

/// Persisted output of a detection run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub detected_classes: Vec<String>,
    pub detections: Vec<FrameRecord>,
    pub statistics: Statistics,
}

impl ResultDocument {
    /// Assemble a document; statistics are always folded from `detections`.
    pub fn assemble(detected_classes: Vec<String>, detections: Vec<FrameRecord>) -> Self {
        let statistics = aggregate(&detections, &detected_classes);
        Self {
            detected_classes,
            detections,
            statistics,
        }
    }

    /// Check that `statistics` is exactly the fold of `detections`.
    pub fn verify(&self) -> Result<()> {
        let expected = aggregate(&self.detections, &self.detected_classes);
        if expected != self.statistics {
            return Err(PipelineError::schema(format!(
                "statistics {:?} do not match the fold of {} frame records ({:?})",
                self.statistics,
                self.detections.len(),
                expected
            )));
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write `doc` to `path`, replacing whatever was there.
///
/// The statistics are re-checked first; a mismatch is never written.
pub fn write_document(path: &Path, doc: &ResultDocument) -> Result<()> {
    doc.verify()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            PipelineError::stream_io(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    let file = File::create(path).map_err(|e| {
        PipelineError::stream_io(format!("cannot create {}: {}", path.display(), e))
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, doc)?;
    writer.flush()?;
    log::info!(
        "wrote {} frame records to {}",
        doc.detections.len(),
        path.display()
    );
    Ok(())
}

/// Parse a document previously written by `write_document`.
pub fn read_document(path: &Path) -> Result<ResultDocument> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RawDetection;
    use crate::record::build_frame_record;

    fn classes() -> Vec<String> {
        vec!["person".to_string(), "car".to_string()]
    }

    #[test]
    fn empty_document_has_zero_statistics() {
        let doc = ResultDocument::assemble(classes(), vec![]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["detections"], serde_json::json!([]));
        assert_eq!(
            value["statistics"],
            serde_json::json!({
                "total_frames": 0,
                "person_detections": 0,
                "car_detections": 0,
                "frames_with_person": 0,
                "frames_with_car": 0
            })
        );
    }

    #[test]
    fn top_level_keys_follow_schema_order() {
        let doc = ResultDocument::assemble(classes(), vec![]);
        let json = serde_json::to_string(&doc).unwrap();
        let a = json.find("\"detected_classes\"").unwrap();
        let b = json.find("\"detections\"").unwrap();
        let c = json.find("\"statistics\"").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn tampered_statistics_fail_verification() {
        let raw = RawDetection {
            class_id: 0,
            confidence: 0.8,
            bbox: [0.0, 0.0, 1.0, 1.0],
        };
        let mut doc =
            ResultDocument::assemble(classes(), vec![build_frame_record(&[raw], 0, 10.0)]);
        doc.statistics.total_frames = 5;
        let err = doc.verify().unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn non_ascii_class_names_are_written_verbatim() {
        let doc = ResultDocument::assemble(vec!["пешеход".to_string()], vec![]);
        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains("\"frames_with_пешеход\": 0"));
        assert!(!json.contains("\\u"));
    }
}
