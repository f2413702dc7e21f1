use anyhow::Result;
use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Backend that replays pre-recorded detections, one entry per frame.
///
/// Once the script is exhausted every further frame has no detections.
#[derive(Default)]
pub struct ScriptedBackend {
    frames: VecDeque<Vec<RawDetection>>,
    served: u64,
}

impl ScriptedBackend {
    pub fn new(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames: frames.into(),
            served: 0,
        }
    }

    /// Queue one more frame of detections.
    pub fn push_frame(&mut self, detections: Vec<RawDetection>) {
        self.frames.push_back(detections);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn served(&self) -> u64 {
        self.served
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        self.served += 1;
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}
