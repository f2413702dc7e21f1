//! Decoded video frames.
//!
//! Frames are RGB8 images stamped at acquisition time. The pipeline keeps
//! only the current frame; capture requests carry their own cropped copy.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::detect::BoundingBox;

/// Frame size every source scales to unless configured otherwise.
pub const DEFAULT_FRAME_WIDTH: u32 = 1020;
pub const DEFAULT_FRAME_HEIGHT: u32 = 500;

pub struct Frame {
    /// Position in the stream, starting at 0.
    pub index: u64,
    /// Wall-clock acquisition time.
    pub captured_at: DateTime<Local>,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, captured_at: DateTime<Local>, image: RgbImage) -> Self {
        Self {
            index,
            captured_at,
            image,
        }
    }

    /// A black frame, for tests and detector-only runs.
    pub fn blank(index: u64, captured_at: DateTime<Local>, width: u32, height: u32) -> Self {
        Self::new(index, captured_at, RgbImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copy out the region under `bbox`, clamped to the frame.
    ///
    /// Returns `None` when nothing of the box overlaps the frame.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<RgbImage> {
        let clamp_x = |x: i32| x.clamp(0, self.width() as i32) as u32;
        let clamp_y = |y: i32| y.clamp(0, self.height() as i32) as u32;
        let (x1, x2) = (clamp_x(bbox.x1), clamp_x(bbox.x2));
        let (y1, y2) = (clamp_y(bbox.y1), clamp_y(bbox.y2));
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(image::imageops::crop_imm(&self.image, x1, y1, x2 - x1, y2 - y1).to_image())
    }
}

/// JPEG-encode an RGB image.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .write_with_encoder(encoder)
        .context("jpeg encoding failed")?;
    Ok(buf)
}
