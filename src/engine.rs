//! The per-frame pass.
//!
//! `Engine` holds the immutable configuration (zones, allow-list, jitter
//! and capture settings). Everything that changes between frames lives in
//! `EngineState`, which the driver owns and threads through every call.

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::assign::{assign_frame, FrameAssignment};
use crate::detect::{ClassAllowList, Detection};
use crate::geometry::ZoneSet;
use crate::slots::{aggregate, SlotCounters, StatusSnapshot, ZoneReport, ZoneStatus};
use crate::stabilize::{Stabilizer, TrackTable, DEFAULT_JITTER_PX};
use crate::violation::{CaptureEvent, CapturePolicy, ViolationTimer, DEFAULT_CAPTURE_THRESHOLD};

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub allowed_classes: ClassAllowList,
    pub jitter_px: i32,
    pub capture_threshold: Duration,
    pub capture_policy: CapturePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            allowed_classes: ClassAllowList::default(),
            jitter_px: DEFAULT_JITTER_PX,
            capture_threshold: DEFAULT_CAPTURE_THRESHOLD,
            capture_policy: CapturePolicy::default(),
        }
    }
}

/// Cross-frame state: track table and frame counter.
#[derive(Clone, Debug, Default)]
pub struct EngineState {
    tracks: TrackTable,
    frames_processed: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &TrackTable {
        &self.tracks
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

/// Outcome of one frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Stabilized records with this frame's tallies.
    pub assignment: FrameAssignment,
    pub counters: SlotCounters,
    pub captures: Vec<CaptureEvent>,
}

pub struct Engine {
    zones: ZoneSet,
    allowed: ClassAllowList,
    stabilizer: Stabilizer,
    timer: ViolationTimer,
}

impl Engine {
    pub fn new(zones: ZoneSet, settings: EngineSettings) -> Self {
        Self {
            zones,
            allowed: settings.allowed_classes,
            stabilizer: Stabilizer::new(settings.jitter_px),
            timer: ViolationTimer::new(settings.capture_threshold, settings.capture_policy),
        }
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn zone_name(&self, index: Option<usize>) -> Option<&str> {
        index.and_then(|i| self.zones.zone(i)).map(|z| z.name())
    }

    /// Run assignment, stabilization, violation timing and aggregation for
    /// one frame of detections observed at `now`.
    pub fn process_frame(
        &self,
        state: &mut EngineState,
        now: DateTime<Local>,
        detections: &[Detection],
    ) -> FrameReport {
        let FrameAssignment { records, tallies } =
            assign_frame(detections, &self.zones, &self.allowed);
        let counters = aggregate(&tallies);

        let (records, mut tracks) = self.stabilizer.stabilize(records, &state.tracks);
        let captures = self.timer.update(&records, &mut tracks, now);
        state.tracks = tracks;

        let frame_index = state.frames_processed;
        state.frames_processed += 1;

        for event in &captures {
            log::info!(
                "violation capture: id={} zone={} box=({}, {}, {}, {}) violating_for={:.1}s",
                event.identity,
                self.zone_name(event.zone).unwrap_or("-"),
                event.bbox.x1,
                event.bbox.y1,
                event.bbox.x2,
                event.bbox.y2,
                event.violating_for.as_secs_f64()
            );
        }

        FrameReport {
            frame_index,
            assignment: FrameAssignment { records, tallies },
            counters,
            captures,
        }
    }

    pub fn zone_reports(&self, report: &FrameReport) -> Vec<ZoneReport> {
        self.zones
            .iter()
            .zip(&report.assignment.tallies)
            .map(|((zone, _), tally)| ZoneReport {
                name: zone.name().to_string(),
                status: ZoneStatus::from_tally(tally),
                occupants: tally.occupants,
                violators: tally.violators,
            })
            .collect()
    }

    /// Status snapshot for the external query interface.
    pub fn snapshot(&self, report: &FrameReport) -> StatusSnapshot {
        StatusSnapshot {
            frame_index: Some(report.frame_index),
            counters: report.counters,
            zones: self.zone_reports(report),
            frame_jpeg: None,
        }
    }
}
