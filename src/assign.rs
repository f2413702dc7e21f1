//! Per-frame zone assignment.

use serde::Serialize;

use crate::classify::is_violating;
use crate::detect::{BoundingBox, ClassAllowList, Detection, PixelPoint};
use crate::geometry::ZoneSet;

/// Occupancy of one zone in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ZoneTally {
    pub occupants: u32,
    pub violators: u32,
}

/// Classification of one allow-listed detection.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationRecord {
    pub id: u64,
    pub label: Option<String>,
    /// Index into the `ZoneSet`, `None` when the centre is outside every zone.
    pub zone: Option<usize>,
    pub violating: bool,
    pub bbox: BoundingBox,
    pub center: PixelPoint,
}

/// Records and tallies for one frame. `tallies[i]` belongs to zone `i`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAssignment {
    pub records: Vec<ClassificationRecord>,
    pub tallies: Vec<ZoneTally>,
}

impl FrameAssignment {
    pub fn tally(&self, zones: &ZoneSet, name: &str) -> Option<ZoneTally> {
        zones.index_of(name).and_then(|i| self.tallies.get(i).copied())
    }

    pub fn total_violators(&self) -> u32 {
        self.tallies.iter().map(|t| t.violators).sum()
    }

    /// Zones holding at least one violator, in declaration order.
    pub fn violating_zones<'a>(&self, zones: &'a ZoneSet) -> Vec<(&'a str, u32)> {
        zones
            .iter()
            .zip(&self.tallies)
            .filter(|(_, tally)| tally.violators > 0)
            .map(|((zone, _), tally)| (zone.name(), tally.violators))
            .collect()
    }
}

/// Classify every allow-listed detection against the zones.
///
/// Zones are tested in declaration order and the first one containing the
/// detection centre wins. A centre outside every zone is violating and
/// counts towards no tally.
pub fn assign_frame(
    detections: &[Detection],
    zones: &ZoneSet,
    allowed: &ClassAllowList,
) -> FrameAssignment {
    let mut tallies = vec![ZoneTally::default(); zones.len()];
    let mut records = Vec::with_capacity(detections.len());

    for det in detections {
        if !allowed.allows(det.label.as_deref()) {
            continue;
        }
        let center = det.center();
        let point = center.to_point();
        let (zone, violating) = match zones.locate(point) {
            Some((index, zone, band)) => {
                let violating = is_violating(point, zone, band);
                tallies[index].occupants += 1;
                if violating {
                    tallies[index].violators += 1;
                }
                (Some(index), violating)
            }
            None => (None, true),
        };
        records.push(ClassificationRecord {
            id: det.id,
            label: det.label.clone(),
            zone,
            violating,
            bbox: det.bbox,
            center,
        });
    }

    FrameAssignment { records, tallies }
}
