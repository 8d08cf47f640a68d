use std::path::Path;

use roadwatch::ui::FrameProgress;
use roadwatch::{
    read_document, run_detection, write_document, PipelineConfig, PipelineError, ResultDocument,
};
use tempfile::TempDir;

fn write_recording(dir: &Path, frames: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("recording.json");
    std::fs::write(&path, serde_json::json!({ "frames": frames }).to_string())
        .expect("write recording");
    path
}

fn config(dir: &TempDir, input: &str, frames: serde_json::Value) -> PipelineConfig {
    let mut cfg = PipelineConfig::for_input(input).expect("config");
    cfg.model = write_recording(dir.path(), frames);
    cfg.output_json = dir.path().join("out").join("detections.json");
    cfg
}

fn quiet() -> FrameProgress {
    FrameProgress::logging("detect", 0)
}

#[test]
fn three_frames_with_person_then_nothing_then_car() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        &dir,
        "stub://clip?frames=3&fps=10",
        serde_json::json!([
            [{"class_id": 0, "confidence": 0.91, "bbox": [1.0, 2.0, 11.0, 22.0]}],
            [],
            [{"class_id": 2, "confidence": 0.75, "bbox": [5.0, 5.0, 25.0, 15.0]}]
        ]),
    );

    let doc = run_detection(&cfg, quiet()).expect("run");
    let stats = serde_json::to_value(&doc.statistics).unwrap();
    assert_eq!(
        stats,
        serde_json::json!({
            "total_frames": 3,
            "person_detections": 1,
            "car_detections": 1,
            "frames_with_person": 1,
            "frames_with_car": 1
        })
    );

    let written = read_document(&cfg.output_json).expect("read back");
    assert_eq!(written, doc);
    let first = &written.detections[0].detections[0];
    assert_eq!(first.class_name, "person");
    assert_eq!(first.bbox.width(), 10.0);
    assert_eq!(first.bbox.height(), 20.0);
    assert_eq!(written.detections[2].timestamp, 0.2);
}

#[test]
fn empty_stream_produces_zeroed_document() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(&dir, "stub://clip?frames=0", serde_json::json!([]));

    let doc = run_detection(&cfg, quiet()).expect("run");
    assert!(doc.detections.is_empty());
    assert_eq!(doc.statistics.total_frames, 0);
    assert!(doc
        .statistics
        .classes
        .iter()
        .all(|t| t.detections == 0 && t.frames_with == 0));
    assert!(cfg.output_json.is_file());
}

#[test]
fn threshold_and_class_filter_apply_before_recording() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        &dir,
        "stub://clip?frames=1",
        serde_json::json!([[
            {"class_id": 2, "confidence": 0.5, "bbox": [0.0, 0.0, 1.0, 1.0]},
            {"class_id": 2, "confidence": 0.4999, "bbox": [0.0, 0.0, 1.0, 1.0]},
            {"class_id": 7, "confidence": 0.99, "bbox": [0.0, 0.0, 1.0, 1.0]}
        ]]),
    );

    let doc = run_detection(&cfg, quiet()).expect("run");
    let kept = &doc.detections[0].detections;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].confidence, 0.5);
    assert_eq!(kept[0].class_name, "car");
}

#[test]
fn oracle_failure_aborts_without_writing() {
    let dir = TempDir::new().expect("tempdir");
    // recording covers two of four frames
    let cfg = config(&dir, "stub://clip?frames=4", serde_json::json!([[], []]));

    let err = run_detection(&cfg, quiet()).unwrap_err();
    assert!(matches!(err, PipelineError::OracleInvocation { frame: 2, .. }));
    assert!(!cfg.output_json.exists());
}

#[test]
fn missing_model_is_configuration_error() {
    let mut cfg = PipelineConfig::for_input("stub://clip").expect("config");
    cfg.model = "/no/such/model.onnx".into();
    let err = run_detection(&cfg, quiet()).unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[test]
fn write_overwrites_existing_artifact() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("detections.json");
    std::fs::write(&path, "x".repeat(4096)).unwrap();

    let doc = ResultDocument::assemble(vec!["car".to_string()], vec![]);
    write_document(&path, &doc).expect("write");
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with('{'));
    assert!(!raw.contains('x'));
}

#[test]
fn serialize_parse_serialize_is_byte_identical() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = config(
        &dir,
        "stub://clip?frames=2&fps=29.97",
        serde_json::json!([
            [{"class_id": 0, "confidence": 0.873_456, "bbox": [1.25, 2.5, 100.125, 200.75]}],
            [{"class_id": 2, "confidence": 0.5, "bbox": [0.1, 0.2, 0.3, 0.4]}]
        ]),
    );
    run_detection(&cfg, quiet()).expect("run");

    let first = std::fs::read_to_string(&cfg.output_json).unwrap();
    let parsed: ResultDocument = serde_json::from_str(&first).unwrap();
    let second = serde_json::to_string_pretty(&parsed).unwrap();
    assert_eq!(first, second);
}
