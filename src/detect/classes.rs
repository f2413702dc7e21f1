use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::path::Path;

use super::result::{BoundingBox, Detection, RawDetection};

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Default labels eligible for zone classification.
pub const DEFAULT_ALLOWED_CLASSES: [&str; 3] = ["person", "car", "suitcase"];

/// Class id to label lookup table.
#[derive(Clone, Debug)]
pub struct ClassCatalog {
    labels: Vec<String>,
}

impl ClassCatalog {
    /// The 80-class COCO ordering used by common object detectors.
    pub fn coco() -> Self {
        Self {
            labels: COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// One label per line; the line number is the class id.
    pub fn from_lines(text: &str) -> Self {
        Self {
            labels: text.lines().map(|line| line.trim().to_string()).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read class list {}: {}", path.display(), e))?;
        let catalog = Self::from_lines(&text);
        if catalog.labels.iter().all(|label| label.is_empty()) {
            return Err(anyhow!("class list {} is empty", path.display()));
        }
        Ok(catalog)
    }

    pub fn label(&self, class_id: u32) -> Option<&str> {
        self.labels
            .get(class_id as usize)
            .map(String::as_str)
            .filter(|label| !label.is_empty())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Attach labels and identities to one frame of detector output.
    pub fn label_detections(&self, raw: &[RawDetection]) -> Vec<Detection> {
        raw.iter()
            .zip(frame_identities(raw))
            .map(|(det, id)| Detection {
                id,
                bbox: BoundingBox::from_f32(det.bbox),
                class_id: det.class_id,
                label: self.label(det.class_id).map(str::to_string),
                confidence: det.confidence,
            })
            .collect()
    }
}

/// Upstream track ids are used only when every row carries one and no two
/// rows share it. Any other frame is keyed by row index.
fn frame_identities(raw: &[RawDetection]) -> Vec<u64> {
    let tracked: Option<Vec<u64>> = raw.iter().map(|det| det.track_id).collect();
    match tracked {
        Some(ids) => {
            let mut seen = HashSet::with_capacity(ids.len());
            if ids.iter().all(|id| seen.insert(*id)) {
                return ids;
            }
            log::debug!("duplicate track ids in frame; keying {} rows by index", raw.len());
        }
        None if raw.iter().any(|det| det.track_id.is_some()) => {
            log::debug!("track ids missing on some rows; keying {} rows by index", raw.len());
        }
        None => {}
    }
    (0..raw.len() as u64).collect()
}

impl Default for ClassCatalog {
    fn default() -> Self {
        Self::coco()
    }
}

/// Labels that take part in zone and violation classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassAllowList {
    labels: HashSet<String>,
}

impl ClassAllowList {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: HashSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(anyhow!("class allow-list must not be empty"));
        }
        Ok(Self { labels })
    }

    pub fn allows(&self, label: Option<&str>) -> bool {
        label.is_some_and(|label| self.labels.contains(&label.to_lowercase()))
    }

    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

impl Default for ClassAllowList {
    fn default() -> Self {
        Self {
            labels: DEFAULT_ALLOWED_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
