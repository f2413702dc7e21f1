//! Parking Lane Violation Monitor
//!
//! This crate watches a fixed camera over a parking lot and decides, frame by
//! frame, whether each detected object sits properly inside its slot.
//!
//! # Architecture
//!
//! Each frame flows through one pass:
//!
//! 1. **Assign**: every allow-listed detection is placed in the first zone
//!    containing its box centre and classified against that zone's lane band.
//! 2. **Stabilize**: boxes that barely moved since the previous frame are
//!    reported at their previous position.
//! 3. **Time**: identities violating without interruption for longer than the
//!    capture threshold produce capture events.
//! 4. **Aggregate**: zones are counted as empty, occupied or violating.
//!
//! Cross-frame state lives in `EngineState`, owned by the driver. Captured
//! evidence is written by a background worker; status is published to a
//! snapshot cell read by the HTTP interface.
//!
//! # Module Structure
//!
//! - `geometry`, `classify`: zones, lane bands and the membership test
//! - `assign`, `stabilize`, `violation`, `slots`: the per-frame stages
//! - `engine`: the single per-frame pass
//! - `detect`: detector interface and adapters
//! - `frame`, `ingest`: decoded frames and their sources
//! - `capture`, `overlay`, `api`: evidence persistence, rendering, status
//! - `config`: process configuration

pub mod api;
pub mod assign;
pub mod capture;
pub mod classify;
pub mod config;
pub mod detect;
pub mod engine;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod overlay;
pub mod slots;
pub mod stabilize;
pub mod violation;

pub use api::{ApiConfig, ApiHandle, ApiServer};
pub use assign::{assign_frame, ClassificationRecord, FrameAssignment, ZoneTally};
pub use capture::{
    CaptureRequest, CaptureStats, CaptureStore, CaptureWorker, FilesystemCaptureStore,
};
pub use classify::is_violating;
pub use config::ParkwatchConfig;
pub use detect::{
    BoundingBox, ClassAllowList, ClassCatalog, Detection, DetectorBackend, PixelPoint,
    RawDetection, ReplayBackend, ScriptedBackend,
};
pub use engine::{Engine, EngineSettings, EngineState, FrameReport};
pub use frame::Frame;
pub use geometry::{lane_band, point_in_zone, LaneBand, LaneLine, Point, Zone, ZoneSet};
pub use ingest::{open_source, FrameSource, ImageSequenceSource, SourceConfig, SyntheticSource};
pub use slots::{aggregate, SlotCounters, StatusBoard, StatusSnapshot, ZoneReport, ZoneStatus};
pub use stabilize::{Stabilizer, TrackState, TrackTable};
pub use violation::{CaptureEvent, CapturePolicy, ViolationTimer};
