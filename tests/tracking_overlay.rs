use anyhow::Result;
use roadwatch::render::BOX_COLOR;
use roadwatch::sink::MemorySink;
use roadwatch::ui::FrameProgress;
use roadwatch::{
    run_tracking, Annotator, FileConfig, FileSource, Frame, IouTracker, OverlayLabel,
    PipelineConfig, PipelineError, ReplayOracle, TrackedDetection, TrackingOverlay,
};
use tempfile::TempDir;

fn car(confidence: f32, identity: Option<u64>) -> TrackedDetection {
    TrackedDetection {
        class_id: 2,
        confidence,
        bbox: [20.0, 30.0, 60.0, 70.0],
        identity,
    }
}

fn stub(frames: u32) -> FileSource {
    FileSource::new(FileConfig {
        path: format!("stub://road?frames={frames}&width=96&height=96"),
    })
    .expect("stub source")
}

#[derive(Default)]
struct Recorder {
    labels: Vec<String>,
}

fn at(bbox: [f32; 4]) -> TrackedDetection {
    TrackedDetection {
        class_id: 2,
        confidence: 0.8,
        bbox,
        identity: None,
    }
}

impl Annotator for &mut Recorder {
    fn annotate(&mut self, _frame: &mut Frame, label: &OverlayLabel) -> Result<()> {
        self.labels.push(label.text.clone());
        Ok(())
    }
}

#[test]
fn persistent_vehicle_is_labelled_until_identity_drops() {
    let settings = PipelineConfig::for_input("stub://road").unwrap().tracking;
    // frames 0-4 untracked, 5-9 carry id 7, 10 loses the identity
    let mut frames: Vec<Vec<TrackedDetection>> = (0..5).map(|_| vec![car(0.62, None)]).collect();
    frames.extend((5..10).map(|_| vec![car(0.62, Some(7))]));
    frames.push(vec![car(0.62, None)]);

    let mut sink = MemorySink::with_size(96, 96);
    let summary = TrackingOverlay::new(&settings, ReplayOracle::new(frames))
        .run(stub(11), &mut sink)
        .expect("run");

    assert_eq!(summary.frames_written, 11);
    assert_eq!(summary.frames_annotated, 5);
    assert_eq!(summary.labels_drawn, 5);

    let frames = sink.frames();
    assert_eq!(frames.len(), 11);
    for (i, frame) in frames.iter().enumerate() {
        let boxed = *frame.get_pixel(20, 30) == BOX_COLOR;
        assert_eq!(boxed, (5..10).contains(&i), "frame {i}");
    }
}

#[test]
fn label_text_reaches_the_annotator() {
    let settings = PipelineConfig::for_input("stub://road").unwrap().tracking;
    let oracle = ReplayOracle::new(vec![vec![car(0.62, Some(7)), car(0.5, Some(8))]]);
    let mut recorder = Recorder::default();
    let mut sink = MemorySink::new();
    TrackingOverlay::new(&settings, oracle)
        .with_annotator(&mut recorder)
        .run(stub(1), &mut sink)
        .expect("run");

    assert_eq!(recorder.labels, vec!["car 7 (0.62)".to_string()]);
}

#[test]
fn tracker_failure_is_fatal() {
    let settings = PipelineConfig::for_input("stub://road").unwrap().tracking;
    let oracle = ReplayOracle::new(vec![vec![]]);
    let mut sink = MemorySink::new();
    let err = TrackingOverlay::new(&settings, oracle)
        .run(stub(3), &mut sink)
        .unwrap_err();
    assert!(matches!(err, PipelineError::OracleInvocation { frame: 1, .. }));
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn tracking_writes_image_sequence() {
    let dir = TempDir::new().unwrap();
    let recording = dir.path().join("tracks.json");
    std::fs::write(
        &recording,
        r#"{"frames": [[{"class_id": 5, "confidence": 0.8, "bbox": [4, 12, 40, 40], "id": 1}], []]}"#,
    )
    .unwrap();

    let mut cfg = PipelineConfig::for_input("stub://road?frames=2&width=64&height=48").unwrap();
    cfg.model = recording;
    cfg.output_video = dir.path().join("frames");

    let summary = run_tracking(&cfg, FrameProgress::logging("track", 0)).expect("run");
    assert_eq!(summary.frames_written, 2);
    assert!(cfg.output_video.join("frame_000000.png").is_file());
    assert!(cfg.output_video.join("frame_000001.png").is_file());
}

#[test]
fn detector_output_gains_stable_identities() {
    let cfg = PipelineConfig::for_input("stub://road").unwrap();
    // two cars drifting right by 2px a frame, no identities from the detector
    let detections: Vec<Vec<TrackedDetection>> = (0..4)
        .map(|i| {
            let dx = 2.0 * i as f32;
            vec![
                at([10.0 + dx, 10.0, 40.0 + dx, 40.0]),
                at([50.0 + dx, 50.0, 80.0 + dx, 80.0]),
            ]
        })
        .collect();
    let tracker = IouTracker::new(ReplayOracle::new(detections), cfg.tracking.iou_threshold);

    let mut recorder = Recorder::default();
    let mut sink = MemorySink::new();
    let summary = TrackingOverlay::new(&cfg.tracking, tracker)
        .with_annotator(&mut recorder)
        .run(stub(4), &mut sink)
        .expect("run");

    assert_eq!(summary.frames_annotated, 4);
    assert_eq!(summary.labels_drawn, 8);
    let expected: Vec<String> = (0..4)
        .flat_map(|_| ["car 1 (0.80)".to_string(), "car 2 (0.80)".to_string()])
        .collect();
    assert_eq!(recorder.labels, expected);
}

#[test]
fn onnx_tracking_needs_a_loadable_model() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("yolov8n.onnx");
    std::fs::write(&model, b"onnx").unwrap();
    let mut cfg = PipelineConfig::for_input("stub://road").unwrap();
    cfg.model = model;
    cfg.output_video = dir.path().join("frames");

    let err = run_tracking(&cfg, FrameProgress::logging("track", 0)).unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}
