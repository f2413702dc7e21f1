//! Detection replay backend.
//!
//! Reads detector output recorded as JSON Lines: line N holds the detections
//! of frame N as an array of `{"box": [x1, y1, x2, y2], "class_id": n,
//! "confidence": c, "track_id": id}` objects (`confidence` and `track_id`
//! optional). Blank lines are frames with no detections.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

pub struct ReplayBackend {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    exhausted: bool,
}

impl ReplayBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.to_string_lossy().contains("://") {
            return Err(anyhow!("detection replay only supports local paths"));
        }
        let file = File::open(path)
            .with_context(|| format!("failed to open detection replay {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            exhausted: false,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let Some(line) = self.lines.next() else {
            log::info!(
                "detection replay {} exhausted after {} frames",
                self.path.display(),
                self.line_no
            );
            self.exhausted = true;
            return Ok(Vec::new());
        };
        self.line_no += 1;
        let line = line
            .with_context(|| format!("failed to read {}:{}", self.path.display(), self.line_no))?;
        if line.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&line).map_err(|e| {
            anyhow!(
                "invalid detections at {}:{}: {}",
                self.path.display(),
                self.line_no,
                e
            )
        })
    }
}
