use anyhow::Result;
use chrono::{Local, TimeDelta, TimeZone};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

use parkwatch::capture::list_captures;
use parkwatch::geometry::{reference_zones, DEFAULT_LANE_INSET};
use parkwatch::ingest::SourceConfig;
use parkwatch::{
    open_source, CaptureRequest, CaptureWorker, ClassCatalog, DetectorBackend, Engine,
    EngineSettings, EngineState, FilesystemCaptureStore, ReplayBackend, ZoneSet,
};

/// 4 s of a car straddling area1's left lane line, then 1 s of the same car
/// parked properly.
fn write_replay(frames_violating: usize, frames_parked: usize) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    for _ in 0..frames_violating {
        writeln!(
            file,
            r#"[{{"box": [105.4, 230.0, 165.9, 270.2], "class_id": 2, "confidence": 0.91, "track_id": 42}}]"#
        )?;
    }
    for _ in 0..frames_parked {
        writeln!(
            file,
            r#"[{{"box": [143.0, 230.0, 203.0, 270.0], "class_id": 2, "confidence": 0.88, "track_id": 42}}]"#
        )?;
    }
    Ok(file)
}

#[test]
fn sustained_violation_is_persisted_as_cropped_jpegs() -> Result<()> {
    let replay = write_replay(40, 10)?;
    let capture_dir = tempdir()?;

    let zones = ZoneSet::new(reference_zones(), DEFAULT_LANE_INSET)?;
    let engine = Engine::new(zones, EngineSettings::default());
    let catalog = ClassCatalog::coco();
    let mut detector = ReplayBackend::open(replay.path())?;
    let mut source = open_source(SourceConfig {
        path: "stub://test".to_string(),
        max_frames: Some(50),
        ..SourceConfig::default()
    })?;
    source.connect()?;
    let worker = CaptureWorker::spawn(FilesystemCaptureStore::new(capture_dir.path())?, 64)?;

    let start = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let mut state = EngineState::new();
    let mut events = Vec::new();
    while let Some(frame) = source.next_frame()? {
        let now = start + TimeDelta::milliseconds(frame.index as i64 * 100);
        let detections = catalog.label_detections(&detector.detect(&frame)?);
        let report = engine.process_frame(&mut state, now, &detections);
        for event in report.captures {
            events.push(event.clone());
            let request = CaptureRequest::from_frame(&frame, event).expect("box inside frame");
            assert_eq!(request.image.dimensions(), (60, 40));
            assert!(worker.submit(request));
        }
    }
    let stats = worker.shutdown()?;

    // frames 30..40 are over the threshold; the parked tail clears the timer
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| e.identity == 42));
    assert_eq!(stats.persisted, 10);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.dropped, 0);
    assert!(state.tracks()[&42].violation_start.is_none());

    // 3.0 s .. 3.9 s all land in the same second
    let names = list_captures(capture_dir.path())?;
    assert_eq!(names, vec!["violation_42_20240501_090003.jpg".to_string()]);
    let image = image::open(capture_dir.path().join(&names[0]))?;
    assert_eq!((image.width(), image.height()), (60, 40));
    Ok(())
}

#[test]
fn replay_exhaustion_yields_empty_frames() -> Result<()> {
    let replay = write_replay(2, 0)?;
    let mut detector = ReplayBackend::open(replay.path())?;
    let frame = parkwatch::Frame::blank(0, Local::now(), 1020, 500);
    assert_eq!(detector.detect(&frame)?.len(), 1);
    assert_eq!(detector.detect(&frame)?.len(), 1);
    assert!(detector.detect(&frame)?.is_empty());
    assert!(detector.is_exhausted());
    Ok(())
}
