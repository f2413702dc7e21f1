//! Slot status aggregation and the shared status snapshot.
//!
//! The pipeline publishes one `StatusSnapshot` per frame by swapping an
//! `Arc`; readers on other threads always see one whole frame's numbers.

use serde::Serialize;
use std::sync::{Arc, RwLock};

use crate::assign::ZoneTally;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    Empty,
    Occupied,
    Violating,
}

impl ZoneStatus {
    /// Violators outrank occupants, which outrank an empty slot.
    pub fn from_tally(tally: &ZoneTally) -> Self {
        if tally.violators > 0 {
            ZoneStatus::Violating
        } else if tally.occupants > 0 {
            ZoneStatus::Occupied
        } else {
            ZoneStatus::Empty
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlotCounters {
    pub empty_slots: u32,
    pub occupied_slots: u32,
    pub violation_slots: u32,
}

impl SlotCounters {
    pub fn total(&self) -> u32 {
        self.empty_slots + self.occupied_slots + self.violation_slots
    }
}

/// Count zones by status. The three counters always sum to `tallies.len()`.
pub fn aggregate(tallies: &[ZoneTally]) -> SlotCounters {
    tallies
        .iter()
        .fold(SlotCounters::default(), |mut counters, tally| {
            match ZoneStatus::from_tally(tally) {
                ZoneStatus::Violating => counters.violation_slots += 1,
                ZoneStatus::Occupied => counters.occupied_slots += 1,
                ZoneStatus::Empty => counters.empty_slots += 1,
            }
            counters
        })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ZoneReport {
    pub name: String,
    pub status: ZoneStatus,
    pub occupants: u32,
    pub violators: u32,
}

/// Everything the status interface exposes about one processed frame.
#[derive(Clone, Debug, Default)]
pub struct StatusSnapshot {
    pub frame_index: Option<u64>,
    pub counters: SlotCounters,
    pub zones: Vec<ZoneReport>,
    /// Annotated frame, JPEG encoded.
    pub frame_jpeg: Option<Arc<Vec<u8>>>,
}

/// Shared, cloneable handle to the latest snapshot.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    latest: Arc<RwLock<Arc<StatusSnapshot>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot wholesale.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.latest.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        match self.latest.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(occupants: u32, violators: u32) -> ZoneTally {
        ZoneTally {
            occupants,
            violators,
        }
    }

    #[test]
    fn zone_priority_is_violating_then_occupied_then_empty() {
        assert_eq!(ZoneStatus::from_tally(&tally(3, 1)), ZoneStatus::Violating);
        assert_eq!(ZoneStatus::from_tally(&tally(2, 0)), ZoneStatus::Occupied);
        assert_eq!(ZoneStatus::from_tally(&tally(0, 0)), ZoneStatus::Empty);
    }

    #[test]
    fn counters_always_cover_every_zone() {
        let cases: Vec<Vec<ZoneTally>> = vec![
            vec![],
            vec![tally(0, 0); 7],
            vec![tally(1, 0), tally(2, 2), tally(0, 0)],
            (0..20).map(|i| tally(i % 3, i % 2)).collect(),
        ];
        for tallies in cases {
            let counters = aggregate(&tallies);
            assert_eq!(counters.total() as usize, tallies.len());
        }
    }

    #[test]
    fn aggregate_counts_each_status() {
        let counters = aggregate(&[tally(1, 0), tally(2, 1), tally(0, 0), tally(0, 0)]);
        assert_eq!(
            counters,
            SlotCounters {
                empty_slots: 2,
                occupied_slots: 1,
                violation_slots: 1,
            }
        );
    }

    #[test]
    fn counters_serialize_with_status_field_names() {
        let json = serde_json::to_value(SlotCounters {
            empty_slots: 4,
            occupied_slots: 2,
            violation_slots: 1,
        })
        .unwrap();
        assert_eq!(json["empty_slots"], 4);
        assert_eq!(json["occupied_slots"], 2);
        assert_eq!(json["violation_slots"], 1);
    }

    #[test]
    fn board_swaps_whole_snapshots() {
        let board = StatusBoard::new();
        let before = board.snapshot();
        assert_eq!(before.frame_index, None);

        let reader = board.clone();
        board.publish(StatusSnapshot {
            frame_index: Some(9),
            counters: aggregate(&[tally(1, 1)]),
            ..StatusSnapshot::default()
        });
        let after = reader.snapshot();
        assert_eq!(after.frame_index, Some(9));
        assert_eq!(after.counters.violation_slots, 1);
        // earlier readers keep their consistent copy
        assert_eq!(before.counters, SlotCounters::default());
    }
}
