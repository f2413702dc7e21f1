//! Violation timing and capture triggering.
//!
//! An identity starts its timer on the first frame it is classified as
//! violating. On later frames of the same uninterrupted violation the
//! elapsed time is checked against the threshold. A single non-violating
//! frame clears the timer, so time never accumulates across gaps.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::assign::ClassificationRecord;
use crate::detect::BoundingBox;
use crate::stabilize::TrackTable;

/// Default sustained violation time before evidence is captured.
pub const DEFAULT_CAPTURE_THRESHOLD: Duration = Duration::from_secs(3);

/// When to emit captures for a violation that is over the threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePolicy {
    /// Every frame while the violation continues.
    #[default]
    EveryFrame,
    /// Once per uninterrupted violation.
    OncePerEpisode,
}

/// Request to persist evidence of a sustained violation.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureEvent {
    pub identity: u64,
    pub zone: Option<usize>,
    /// Region to crop, the stabilized box of this frame.
    pub bbox: BoundingBox,
    pub timestamp: DateTime<Local>,
    pub violating_for: Duration,
}

#[derive(Clone, Copy, Debug)]
pub struct ViolationTimer {
    threshold: Duration,
    policy: CapturePolicy,
}

impl ViolationTimer {
    pub fn new(threshold: Duration, policy: CapturePolicy) -> Self {
        Self { threshold, policy }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn policy(&self) -> CapturePolicy {
        self.policy
    }

    /// Advance timers for this frame's resolved records.
    ///
    /// `tracks` must already hold an entry for every record identity. Only
    /// the first record of a repeated identity advances its timer.
    pub fn update(
        &self,
        records: &[ClassificationRecord],
        tracks: &mut TrackTable,
        now: DateTime<Local>,
    ) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id) {
                continue;
            }
            let Some(track) = tracks.get_mut(&record.id) else {
                continue;
            };
            if !record.violating {
                track.violation_start = None;
                track.captured = false;
                continue;
            }
            let Some(start) = track.violation_start else {
                track.violation_start = Some(now);
                continue;
            };
            // A clock step backwards reads as no time elapsed.
            let Ok(elapsed) = now.signed_duration_since(start).to_std() else {
                continue;
            };
            if elapsed < self.threshold {
                continue;
            }
            if self.policy == CapturePolicy::OncePerEpisode && track.captured {
                continue;
            }
            track.captured = true;
            events.push(CaptureEvent {
                identity: record.id,
                zone: record.zone,
                bbox: record.bbox,
                timestamp: now,
                violating_for: elapsed,
            });
        }
        events
    }
}

impl Default for ViolationTimer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_THRESHOLD, CapturePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stabilize::TrackState;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn record(violating: bool) -> ClassificationRecord {
        let bbox = BoundingBox::new(10, 10, 50, 40);
        ClassificationRecord {
            id: 7,
            label: Some("car".to_string()),
            zone: Some(2),
            violating,
            bbox,
            center: bbox.center(),
        }
    }

    fn table() -> TrackTable {
        let bbox = BoundingBox::new(10, 10, 50, 40);
        let mut tracks = TrackTable::new();
        tracks.insert(
            7,
            TrackState {
                bbox,
                center: bbox.center(),
                violation_start: None,
                captured: false,
            },
        );
        tracks
    }

    /// Feed one record per 100 ms and count captures.
    fn run(timer: &ViolationTimer, tracks: &mut TrackTable, pattern: &[bool], start_ms: i64) -> usize {
        pattern
            .iter()
            .enumerate()
            .map(|(i, &violating)| {
                let now = t0() + TimeDelta::milliseconds(start_ms + i as i64 * 100);
                timer.update(&[record(violating)], tracks, now).len()
            })
            .sum()
    }

    #[test]
    fn sustained_violation_captures_every_frame_after_threshold() {
        let timer = ViolationTimer::default();
        let mut tracks = table();
        let mut captures = Vec::new();
        for i in 0..40i64 {
            let now = t0() + TimeDelta::milliseconds(i * 100);
            captures.push(timer.update(&[record(true)], &mut tracks, now).len());
        }
        // frame 30 is exactly 3.0 s after the first violating frame
        assert!(captures[..30].iter().all(|&n| n == 0));
        assert!(captures[30..].iter().all(|&n| n == 1));
    }

    #[test]
    fn capture_event_carries_box_and_elapsed() {
        let timer = ViolationTimer::default();
        let mut tracks = table();
        timer.update(&[record(true)], &mut tracks, t0());
        let events = timer.update(&[record(true)], &mut tracks, t0() + TimeDelta::seconds(4));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].identity, 7);
        assert_eq!(events[0].zone, Some(2));
        assert_eq!(events[0].bbox, BoundingBox::new(10, 10, 50, 40));
        assert_eq!(events[0].violating_for, Duration::from_secs(4));
    }

    #[test]
    fn one_clear_frame_resets_the_timer() {
        let timer = ViolationTimer::default();
        let mut tracks = table();
        // 2.9 s violating, one clear frame, 2.9 s violating again
        let mut pattern = vec![true; 30];
        pattern.push(false);
        pattern.extend(vec![true; 30]);
        assert_eq!(run(&timer, &mut tracks, &pattern, 0), 0);
    }

    #[test]
    fn once_per_episode_captures_once_until_cleared() {
        let timer = ViolationTimer::new(DEFAULT_CAPTURE_THRESHOLD, CapturePolicy::OncePerEpisode);
        let mut tracks = table();
        assert_eq!(run(&timer, &mut tracks, &[true; 50], 0), 1);
        let mut pattern = vec![false];
        pattern.extend(vec![true; 40]);
        assert_eq!(run(&timer, &mut tracks, &pattern, 5_000), 1);
    }

    #[test]
    fn first_violating_frame_never_captures() {
        let timer = ViolationTimer::new(Duration::ZERO, CapturePolicy::EveryFrame);
        let mut tracks = table();
        assert!(timer.update(&[record(true)], &mut tracks, t0()).is_empty());
        assert_eq!(timer.update(&[record(true)], &mut tracks, t0()).len(), 1);
    }

    #[test]
    fn repeated_identity_does_not_reset_the_timer() {
        let timer = ViolationTimer::default();
        let mut tracks = table();
        let mut captures = 0;
        for i in 0..40i64 {
            let now = t0() + TimeDelta::milliseconds(i * 100);
            captures += timer
                .update(&[record(true), record(false)], &mut tracks, now)
                .len();
        }
        assert_eq!(captures, 10);
    }

    #[test]
    fn backwards_clock_does_not_capture() {
        let timer = ViolationTimer::default();
        let mut tracks = table();
        timer.update(&[record(true)], &mut tracks, t0());
        let earlier = t0() - TimeDelta::seconds(10);
        assert!(timer.update(&[record(true)], &mut tracks, earlier).is_empty());
    }
}
