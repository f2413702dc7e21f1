//! Synthetic frame source (`stub://`).
//!
//! Produces a flat asphalt-coloured scene with a slowly shifting texture so
//! consecutive frames differ. Used by tests, the demo and dry runs.

use anyhow::Result;
use chrono::Local;
use image::{Rgb, RgbImage};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    /// Simulated scene state, advanced every 50 frames.
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn generate_image(&mut self) -> RgbImage {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let shift = self.frame_count as u32 + self.scene_state as u32;
        RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            let grain = ((x + y + shift) % 16) as u8;
            Rgb([70 + grain, 72 + grain, 76 + grain])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {}", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        let index = self.frame_count;
        self.frame_count += 1;
        let image = self.generate_image();
        Ok(Some(Frame::new(index, Local::now(), image)))
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(max_frames: Option<u64>) -> SyntheticSource {
        SyntheticSource::new(SourceConfig {
            width: 40,
            height: 20,
            max_frames,
            ..SourceConfig::default()
        })
    }

    #[test]
    fn frames_are_indexed_from_zero() {
        let mut source = source(None);
        for expected in 0..5 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.index, expected);
        }
        assert!(source.is_healthy());
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = source(None);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_ne!(a.image().as_raw(), b.image().as_raw());
    }

    #[test]
    fn frame_limit_ends_stream() {
        let mut source = source(Some(3));
        let mut frames = 0;
        while source.next_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 3);
        assert!(source.next_frame().unwrap().is_none());
    }
}
