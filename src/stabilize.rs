//! Frame-to-frame box stabilization.
//!
//! Correlation is by identity equality only. When a detection's centre moved
//! less than the jitter threshold on both axes since the previous frame, the
//! previous box is reported again so the rendered box does not flicker. The
//! violation flag is never touched.

use chrono::{DateTime, Local};
use std::collections::HashMap;

use crate::assign::ClassificationRecord;
use crate::detect::{BoundingBox, PixelPoint};

/// Default per-axis jitter threshold in pixels.
pub const DEFAULT_JITTER_PX: i32 = 10;

/// State carried from one frame to the next for a single identity.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackState {
    /// Box as detected in the last frame (before stabilization).
    pub bbox: BoundingBox,
    pub center: PixelPoint,
    /// Start of the current uninterrupted violation, if any.
    pub violation_start: Option<DateTime<Local>>,
    /// Whether the current violation episode has produced a capture.
    pub captured: bool,
}

impl TrackState {
    fn sighted(record: &ClassificationRecord) -> Self {
        Self {
            bbox: record.bbox,
            center: record.center,
            violation_start: None,
            captured: false,
        }
    }
}

pub type TrackTable = HashMap<u64, TrackState>;

#[derive(Clone, Copy, Debug)]
pub struct Stabilizer {
    jitter_px: i32,
}

impl Stabilizer {
    pub fn new(jitter_px: i32) -> Self {
        Self { jitter_px }
    }

    pub fn jitter_px(&self) -> i32 {
        self.jitter_px
    }

    /// Resolve this frame's boxes against the previous frame's tracks.
    ///
    /// The returned table holds exactly the identities seen in `current`;
    /// anything not seen this frame is dropped. Violation timing carries over
    /// for identities that persist.
    pub fn stabilize(
        &self,
        current: Vec<ClassificationRecord>,
        previous: &TrackTable,
    ) -> (Vec<ClassificationRecord>, TrackTable) {
        let mut tracks = TrackTable::with_capacity(current.len());
        let resolved = current
            .into_iter()
            .map(|mut record| {
                if tracks.contains_key(&record.id) {
                    log::debug!("identity {} repeated in frame; keeping first row", record.id);
                    return record;
                }
                let mut next = TrackState::sighted(&record);
                if let Some(prev) = previous.get(&record.id) {
                    next.violation_start = prev.violation_start;
                    next.captured = prev.captured;
                    if self.is_jitter(prev.center, record.center) {
                        record.bbox = prev.bbox;
                    }
                }
                tracks.insert(record.id, next);
                record
            })
            .collect();
        (resolved, tracks)
    }

    fn is_jitter(&self, prev: PixelPoint, current: PixelPoint) -> bool {
        let limit = i64::from(self.jitter_px);
        (i64::from(current.x) - i64::from(prev.x)).abs() < limit
            && (i64::from(current.y) - i64::from(prev.y)).abs() < limit
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_PX)
    }
}
