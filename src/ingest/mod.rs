//! Frame ingestion sources.
//!
//! This module provides the sources the pipeline pulls frames from:
//! - Synthetic scenes (`stub://name`), for tests and dry runs
//! - Local image sequences (a directory of JPEG/PNG files)
//!
//! Every source scales its output to the configured frame size so zone
//! coordinates stay valid. `next_frame` returning `Ok(None)` ends the stream.

pub mod file;
pub mod synthetic;

use anyhow::{anyhow, Result};

use crate::frame::{Frame, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

pub use file::ImageSequenceSource;
pub use synthetic::SyntheticSource;

/// Configuration shared by all frame sources.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://name` or a local directory path.
    pub path: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "stub://parking_lot".to_string(),
            target_fps: 10,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            max_frames: None,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub path: String,
}

pub trait FrameSource: Send {
    /// Connect to the source.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Build the source named by `config.path`.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.path.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if !is_local_path(&config.path) {
        return Err(anyhow!(
            "frame ingestion only supports local paths (no URL schemes)"
        ));
    }
    Ok(Box::new(ImageSequenceSource::new(config)?))
}

pub(crate) fn is_local_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
