use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{ApiConfig, DEFAULT_API_ADDR};
use crate::capture::{DEFAULT_CAPTURE_DIR, DEFAULT_CAPTURE_QUEUE};
use crate::detect::{ClassAllowList, ClassCatalog, DEFAULT_ALLOWED_CLASSES};
use crate::engine::EngineSettings;
use crate::geometry::{reference_zones, Point, Zone, ZoneSet, DEFAULT_LANE_INSET};
use crate::ingest::SourceConfig;
use crate::stabilize::DEFAULT_JITTER_PX;
use crate::violation::{CapturePolicy, DEFAULT_CAPTURE_THRESHOLD};

#[derive(Debug, Deserialize, Default)]
struct ParkwatchConfigFile {
    zones: Option<Vec<ZoneConfigFile>>,
    allowed_classes: Option<Vec<String>>,
    lane_inset: Option<f64>,
    jitter_px: Option<i32>,
    capture: Option<CaptureConfigFile>,
    api: Option<ApiConfigFile>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    annotate: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ZoneConfigFile {
    name: String,
    points: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    dir: Option<PathBuf>,
    threshold_ms: Option<u64>,
    policy: Option<CapturePolicy>,
    queue: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    fps: Option<u32>,
    max_frames: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    replay_path: Option<PathBuf>,
    classes_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ParkwatchConfig {
    pub zones: Vec<Zone>,
    pub allowed_classes: Vec<String>,
    pub lane_inset: f64,
    pub jitter_px: i32,
    pub capture: CaptureSettings,
    pub api_addr: String,
    pub source: SourceConfig,
    pub detector: DetectorSettings,
    pub annotate: bool,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub dir: PathBuf,
    pub threshold: Duration,
    pub policy: CapturePolicy,
    pub queue: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DetectorSettings {
    /// JSON Lines detections to replay, one line per frame.
    pub replay_path: Option<PathBuf>,
    /// Class list file; the built-in COCO list when unset.
    pub classes_path: Option<PathBuf>,
}

impl ParkwatchConfig {
    /// Load from the file named by `PARKWATCH_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like `load`, but an explicit `path` wins over `PARKWATCH_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("PARKWATCH_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkwatchConfigFile) -> Result<Self> {
        let zones = match file.zones {
            Some(zones) => zones
                .into_iter()
                .map(zone_from_file)
                .collect::<Result<Vec<_>>>()?,
            None => reference_zones(),
        };
        let allowed_classes = file.allowed_classes.unwrap_or_else(|| {
            DEFAULT_ALLOWED_CLASSES
                .iter()
                .map(|label| label.to_string())
                .collect()
        });
        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureSettings {
            dir: capture_file
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            threshold: capture_file
                .threshold_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CAPTURE_THRESHOLD),
            policy: capture_file.policy.unwrap_or_default(),
            queue: capture_file.queue.unwrap_or(DEFAULT_CAPTURE_QUEUE),
        };
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let defaults = SourceConfig::default();
        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            path: source_file.path.unwrap_or(defaults.path),
            target_fps: source_file.fps.unwrap_or(defaults.target_fps),
            width: source_file.width.unwrap_or(defaults.width),
            height: source_file.height.unwrap_or(defaults.height),
            max_frames: source_file.max_frames,
        };
        let detector = file
            .detector
            .map(|detector| DetectorSettings {
                replay_path: detector.replay_path,
                classes_path: detector.classes_path,
            })
            .unwrap_or_default();
        Ok(Self {
            zones,
            allowed_classes,
            lane_inset: file.lane_inset.unwrap_or(DEFAULT_LANE_INSET),
            jitter_px: file.jitter_px.unwrap_or(DEFAULT_JITTER_PX),
            capture,
            api_addr,
            source,
            detector,
            annotate: file.annotate.unwrap_or(true),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("PARKWATCH_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("PARKWATCH_SOURCE") {
            if !path.trim().is_empty() {
                self.source.path = path;
            }
        }
        if let Ok(dir) = std::env::var("PARKWATCH_CAPTURE_DIR") {
            if !dir.trim().is_empty() {
                self.capture.dir = PathBuf::from(dir);
            }
        }
        if let Ok(threshold) = std::env::var("PARKWATCH_CAPTURE_THRESHOLD_MS") {
            let millis: u64 = threshold.trim().parse().map_err(|_| {
                anyhow!("PARKWATCH_CAPTURE_THRESHOLD_MS must be an integer number of milliseconds")
            })?;
            self.capture.threshold = Duration::from_millis(millis);
        }
        if let Ok(classes) = std::env::var("PARKWATCH_ALLOWED_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.allowed_classes = parsed;
            }
        }
        if let Ok(path) = std::env::var("PARKWATCH_DETECTIONS") {
            if !path.trim().is_empty() {
                self.detector.replay_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.zone_set()?;
        let allowed = self.allow_list()?;
        self.allowed_classes = allowed.labels().iter().map(|l| l.to_string()).collect();

        if self.jitter_px <= 0 {
            return Err(anyhow!("jitter_px must be greater than zero"));
        }
        if self.capture.threshold.is_zero() {
            return Err(anyhow!("capture threshold must be greater than zero"));
        }
        if self.capture.queue == 0 {
            return Err(anyhow!("capture queue must be greater than zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source fps must be at least 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source frame size must be non-zero"));
        }
        Ok(())
    }

    pub fn zone_set(&self) -> Result<ZoneSet> {
        ZoneSet::new(self.zones.clone(), self.lane_inset)
    }

    pub fn allow_list(&self) -> Result<ClassAllowList> {
        ClassAllowList::new(&self.allowed_classes)
    }

    pub fn class_catalog(&self) -> Result<ClassCatalog> {
        match &self.detector.classes_path {
            Some(path) => ClassCatalog::load(path),
            None => Ok(ClassCatalog::coco()),
        }
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            allowed_classes: self.allow_list()?,
            jitter_px: self.jitter_px,
            capture_threshold: self.capture.threshold,
            capture_policy: self.capture.policy,
        })
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            addr: self.api_addr.clone(),
            capture_dir: self.capture.dir.clone(),
        }
    }
}

fn zone_from_file(zone: ZoneConfigFile) -> Result<Zone> {
    let vertices: [[f64; 2]; 4] = zone.points.as_slice().try_into().map_err(|_| {
        anyhow!(
            "zone '{}' must have exactly 4 points, got {}",
            zone.name,
            zone.points.len()
        )
    })?;
    Zone::new(&zone.name, vertices.map(Point::from))
}

fn read_config_file(path: &Path) -> Result<ParkwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: ParkwatchConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
