//! Local image-sequence frame source.
//!
//! `ImageSequenceSource` decodes the JPEG/PNG files of a local directory in
//! lexicographic filename order. A path naming a single image is a one-frame
//! sequence. Every frame is resized to the configured frame size.
//!
//! The source MUST NOT fetch remote URLs.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::imageops::{self, FilterType};
use std::path::{Path, PathBuf};

use super::{is_local_path, FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct ImageSequenceSource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    last_error: bool,
}

impl ImageSequenceSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if !is_local_path(&config.path) || config.path.starts_with("stub://") {
            return Err(anyhow!(
                "image sequence ingestion only supports local paths (no URL schemes)"
            ));
        }
        let files = list_images(Path::new(&config.path))?;
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", config.path));
        }
        Ok(Self {
            config,
            files,
            cursor: 0,
            frame_count: 0,
            last_error: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "ImageSequenceSource: {} images in {}",
            self.files.len(),
            self.config.path
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let decoded = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()));
        self.last_error = decoded.is_err();
        let mut image = decoded?.to_rgb8();
        if image.dimensions() != (self.config.width, self.config.height) {
            image = imageops::resize(
                &image,
                self.config.width,
                self.config.height,
                FilterType::Triangle,
            );
        }
        let index = self.frame_count;
        self.frame_count += 1;
        Ok(Some(Frame::new(index, Local::now(), image)))
    }

    fn is_healthy(&self) -> bool {
        !self.last_error
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn list_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries = std::fs::read_dir(path)
        .with_context(|| format!("failed to read frame directory {}", path.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let file = entry?.path();
        let is_image = file
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image && file.is_file() {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}
