use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::classes;
use crate::error::{PipelineError, Result};

const DEFAULT_OUTPUT_JSON: &str = "detections.json";
const DEFAULT_OUTPUT_VIDEO: &str = "tracked.mp4";
const DEFAULT_MODEL: &str = "models/yolov8n.onnx";
const DEFAULT_CONF_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_IOU: f32 = 0.7;
const DEFAULT_TRACK_CONF_THRESHOLD: f32 = 0.5;
const DEFAULT_TRACK_IOU: f32 = 0.4;
const DEFAULT_INFERENCE_SIZE: u32 = 640;
const DEFAULT_PROGRESS_INTERVAL: u64 = 30;
const DEFAULT_DETECTION_CLASSES: &[&str] = &["person", "car"];

pub const CONFIG_ENV: &str = "ROADWATCH_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    input: Option<String>,
    output_json: Option<PathBuf>,
    output_video: Option<PathBuf>,
    model: Option<PathBuf>,
    detection: Option<DetectionConfigFile>,
    tracking: Option<TrackingConfigFile>,
    inference_size: Option<u32>,
    progress_interval: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    classes: Option<Vec<String>>,
    nms_iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackingConfigFile {
    confidence_threshold: Option<f32>,
    class_ids: Option<Vec<u32>>,
    iou_threshold: Option<f32>,
}

/// Run configuration. Built once, then shared read-only with every component.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: String,
    pub output_json: PathBuf,
    pub output_video: PathBuf,
    pub model: PathBuf,
    pub detection: DetectionSettings,
    pub tracking: TrackingSettings,
    pub inference_size: u32,
    /// Frames between progress notifications; 0 disables them.
    pub progress_interval: u64,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Inclusive lower bound handed to the detection oracle.
    pub confidence_threshold: f32,
    /// Class names reported as `detected_classes`, in order.
    pub classes: Vec<String>,
    /// Allow-list resolved from `classes`.
    pub class_ids: BTreeSet<u32>,
    pub nms_iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Strict lower bound applied by the overlay filter.
    pub confidence_threshold: f32,
    pub class_ids: BTreeSet<u32>,
    pub iou_threshold: f32,
}

/// Values supplied on the command line. They win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub output_json: Option<PathBuf>,
    pub output_video: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub confidence_threshold: Option<f32>,
}

impl PipelineConfig {
    /// Load from `path` (or `ROADWATCH_CONFIG`), then environment, then overrides.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => PipelineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults for everything except the input locator. Ignores the environment.
    pub fn for_input(input: impl Into<String>) -> Result<Self> {
        let mut cfg = Self::from_file(PipelineConfigFile::default());
        cfg.input = input.into();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let detection = file.detection.unwrap_or_default();
        let tracking = file.tracking.unwrap_or_default();
        Self {
            input: file.input.unwrap_or_default(),
            output_json: file
                .output_json
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_JSON)),
            output_video: file
                .output_video
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_VIDEO)),
            model: file.model.unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL)),
            detection: DetectionSettings {
                confidence_threshold: detection
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONF_THRESHOLD),
                classes: detection.classes.unwrap_or_else(|| {
                    DEFAULT_DETECTION_CLASSES
                        .iter()
                        .map(|name| name.to_string())
                        .collect()
                }),
                class_ids: BTreeSet::new(),
                nms_iou_threshold: detection.nms_iou_threshold.unwrap_or(DEFAULT_NMS_IOU),
            },
            tracking: TrackingSettings {
                confidence_threshold: tracking
                    .confidence_threshold
                    .unwrap_or(DEFAULT_TRACK_CONF_THRESHOLD),
                class_ids: tracking
                    .class_ids
                    .map(|ids| ids.into_iter().collect())
                    .unwrap_or_else(|| classes::VEHICLE_CLASS_IDS.iter().copied().collect()),
                iou_threshold: tracking.iou_threshold.unwrap_or(DEFAULT_TRACK_IOU),
            },
            inference_size: file.inference_size.unwrap_or(DEFAULT_INFERENCE_SIZE),
            progress_interval: file.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(input) = non_empty_env("ROADWATCH_INPUT") {
            self.input = input;
        }
        if let Some(path) = non_empty_env("ROADWATCH_OUTPUT_JSON") {
            self.output_json = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("ROADWATCH_OUTPUT_VIDEO") {
            self.output_video = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("ROADWATCH_MODEL") {
            self.model = PathBuf::from(path);
        }
        if let Some(conf) = non_empty_env("ROADWATCH_CONF_THRESHOLD") {
            self.detection.confidence_threshold = conf.trim().parse().map_err(|_| {
                PipelineError::configuration("ROADWATCH_CONF_THRESHOLD must be a number")
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(input) = overrides.input {
            self.input = input;
        }
        if let Some(path) = overrides.output_json {
            self.output_json = path;
        }
        if let Some(path) = overrides.output_video {
            self.output_video = path;
        }
        if let Some(path) = overrides.model {
            self.model = path;
        }
        if let Some(conf) = overrides.confidence_threshold {
            self.detection.confidence_threshold = conf;
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(PipelineError::configuration("input locator must be set"));
        }
        check_unit_range(
            "detection.confidence_threshold",
            self.detection.confidence_threshold,
        )?;
        check_unit_range(
            "tracking.confidence_threshold",
            self.tracking.confidence_threshold,
        )?;
        check_iou("detection.nms_iou_threshold", self.detection.nms_iou_threshold)?;
        check_iou("tracking.iou_threshold", self.tracking.iou_threshold)?;
        if self.inference_size == 0 || self.inference_size % 32 != 0 {
            return Err(PipelineError::configuration(format!(
                "inference_size must be a positive multiple of 32, got {}",
                self.inference_size
            )));
        }

        if self.detection.classes.is_empty() {
            return Err(PipelineError::configuration(
                "detection.classes must name at least one class",
            ));
        }
        let mut seen = BTreeSet::new();
        let mut ids = BTreeSet::new();
        for name in &self.detection.classes {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::configuration(format!(
                    "detection class '{}' listed twice",
                    name
                )));
            }
            let id = classes::class_id(name).ok_or_else(|| {
                PipelineError::configuration(format!("unknown detection class '{}'", name))
            })?;
            ids.insert(id);
        }
        self.detection.class_ids = ids;

        if self.tracking.class_ids.is_empty() {
            return Err(PipelineError::configuration(
                "tracking.class_ids must not be empty",
            ));
        }
        Ok(())
    }
}

fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PipelineError::configuration(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_iou(name: &str, value: f32) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(PipelineError::configuration(format!(
            "{} must be within (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let parsed = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| {
        PipelineError::configuration(format!("invalid config file {}: {}", path.display(), e))
    })
}
