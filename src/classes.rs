//! Class identifiers and names.
//!
//! Two tables live here. `class_name` is the fixed mapping that is part of
//! the result document schema; ids outside it get a synthetic `class_{id}`
//! name. `coco_label` is the full 80-entry COCO label list the detector was
//! trained on, used when labelling overlay boxes.

use std::borrow::Cow;

pub const PERSON: u32 = 0;
pub const CAR: u32 = 2;

/// Schema mapping for detection records.
pub const CLASS_NAMES: &[(u32, &str)] = &[
    (0, "person"),
    (1, "bicycle"),
    (2, "car"),
    (3, "motorcycle"),
    (5, "bus"),
    (7, "truck"),
];

/// Vehicle ids accepted by the tracking overlay: car, motorcycle, bus, train, truck, boat.
pub const VEHICLE_CLASS_IDS: &[u32] = &[2, 3, 5, 6, 7, 8];

/// Number of classes the detection model emits.
pub const COCO_CLASS_COUNT: u32 = 80;

const COCO_LABELS: [&str; COCO_CLASS_COUNT as usize] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Resolve a class id through the schema mapping.
pub fn class_name(class_id: u32) -> Cow<'static, str> {
    CLASS_NAMES
        .iter()
        .find(|(id, _)| *id == class_id)
        .map(|(_, name)| Cow::Borrowed(*name))
        .unwrap_or_else(|| Cow::Owned(format!("class_{class_id}")))
}

/// Reverse lookup through the schema mapping.
pub fn class_id(name: &str) -> Option<u32> {
    CLASS_NAMES
        .iter()
        .find(|(_, known)| *known == name)
        .map(|(id, _)| *id)
}

/// Model label for overlay text. Falls back to the schema mapping past the COCO range.
pub fn coco_label(class_id: u32) -> Cow<'static, str> {
    match COCO_LABELS.get(class_id as usize) {
        Some(label) => Cow::Borrowed(*label),
        None => class_name(class_id),
    }
}
