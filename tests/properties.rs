use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

use roadwatch::{aggregate, build_frame_record, record::frame_timestamp, RawDetection};

const TRACKED: [&str; 2] = ["person", "car"];

#[derive(Clone, Debug)]
struct Frames(Vec<Vec<RawDetection>>);

impl Arbitrary for Frames {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 40;
        let frames = (0..len)
            .map(|_| {
                let n = usize::arbitrary(g) % 5;
                (0..n)
                    .map(|_| RawDetection {
                        class_id: *g.choose(&[0u32, 1, 2, 7]).unwrap_or(&0),
                        confidence: f32::from(u8::arbitrary(g)) / 255.0,
                        bbox: [0.0, 0.0, 10.0, 10.0],
                    })
                    .collect()
            })
            .collect();
        Frames(frames)
    }
}

#[quickcheck]
fn frame_numbers_are_contiguous_from_zero(frames: Frames, fps: u8) -> bool {
    let fps = f64::from(fps.max(1));
    frames
        .0
        .iter()
        .enumerate()
        .map(|(i, raw)| build_frame_record(raw, i as u64, fps))
        .enumerate()
        .all(|(i, rec)| rec.frame_number == i as u64 && rec.timestamp == i as f64 / fps)
}

#[quickcheck]
fn timestamps_increase_with_frame_number(n: u32, fps: u8) -> bool {
    let fps = f64::from(fps.max(1));
    let n = u64::from(n);
    frame_timestamp(n + 1, fps) > frame_timestamp(n, fps)
}

#[quickcheck]
fn statistics_fold_matches_records(frames: Frames) -> bool {
    let records: Vec<_> = frames
        .0
        .iter()
        .enumerate()
        .map(|(i, raw)| build_frame_record(raw, i as u64, 30.0))
        .collect();
    let stats = aggregate(&records, &TRACKED[..]);

    let mut ok = stats.total_frames == records.len() as u64;
    for name in TRACKED {
        let detections: usize = records
            .iter()
            .map(|r| r.detections.iter().filter(|d| d.class_name == name).count())
            .sum();
        let frames_with = records
            .iter()
            .filter(|r| r.detections.iter().any(|d| d.class_name == name))
            .count();
        ok &= stats.detections_of(name) == detections as u64;
        ok &= stats.frames_with(name) == frames_with as u64;
        ok &= stats.frames_with(name) <= stats.total_frames;
        ok &= stats.frames_with(name) <= stats.detections_of(name);
    }
    ok
}
