//! Evidence capture persistence.
//!
//! The engine only decides *when* to capture. Cropping happens on the
//! pipeline thread (the frame is gone by the next iteration); encoding and
//! writing happen on a dedicated worker fed through a bounded queue. A full
//! queue drops the request rather than stalling frame processing.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::frame::{encode_jpeg, Frame};
use crate::violation::CaptureEvent;

pub const DEFAULT_CAPTURE_DIR: &str = "captures";
pub const DEFAULT_CAPTURE_QUEUE: usize = 64;
const CAPTURE_JPEG_QUALITY: u8 = 90;

/// A cropped evidence image waiting to be persisted.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub event: CaptureEvent,
    pub image: RgbImage,
}

impl CaptureRequest {
    /// Crop the event's box out of `frame`. `None` if the box misses the frame.
    pub fn from_frame(frame: &Frame, event: CaptureEvent) -> Option<Self> {
        let image = frame.crop(&event.bbox)?;
        Some(Self { event, image })
    }
}

pub trait CaptureStore: Send {
    /// Persist one capture, returning where it was written.
    fn persist(&mut self, request: &CaptureRequest) -> Result<PathBuf>;
}

/// `violation_{identity}_{YYYYmmdd_HHMMSS}.jpg`, local time.
pub fn capture_file_name(identity: u64, timestamp: &DateTime<Local>) -> String {
    format!(
        "violation_{}_{}.jpg",
        identity,
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Writes JPEG captures into a single directory.
///
/// Two captures of the same identity within the same second share a file
/// name; the later one replaces the earlier.
#[derive(Debug)]
pub struct FilesystemCaptureStore {
    dir: PathBuf,
}

impl FilesystemCaptureStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create capture dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CaptureStore for FilesystemCaptureStore {
    fn persist(&mut self, request: &CaptureRequest) -> Result<PathBuf> {
        let name = capture_file_name(request.event.identity, &request.event.timestamp);
        let path = self.dir.join(name);
        let jpeg = encode_jpeg(&request.image, CAPTURE_JPEG_QUALITY)?;
        write_atomic(&path, &jpeg)
            .with_context(|| format!("failed to write capture {}", path.display()))?;
        Ok(path)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Sorted file names of the captures stored in `dir`. A missing directory
/// has no captures.
pub fn list_captures(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read capture dir {}", dir.display()))?
    {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with("violation_") && name.ends_with(".jpg") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub persisted: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    persisted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Background writer draining a bounded capture queue.
pub struct CaptureWorker {
    tx: Option<SyncSender<CaptureRequest>>,
    counters: Arc<Counters>,
    join: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    pub fn spawn<S: CaptureStore + 'static>(store: S, queue: usize) -> Result<Self> {
        if queue == 0 {
            return Err(anyhow!("capture queue must hold at least one request"));
        }
        let (tx, rx) = mpsc::sync_channel(queue);
        let counters = Arc::new(Counters::default());
        let worker_counters = counters.clone();
        let join = std::thread::Builder::new()
            .name("capture-writer".to_string())
            .spawn(move || run_worker(store, rx, &worker_counters))
            .context("failed to spawn capture worker")?;
        Ok(Self {
            tx: Some(tx),
            counters,
            join: Some(join),
        })
    }

    /// Queue a capture without blocking. Returns false if it was dropped.
    pub fn submit(&self, request: CaptureRequest) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(request)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "capture queue full; dropped capture for id={}",
                    request.event.identity
                );
                false
            }
            Err(TrySendError::Disconnected(request)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "capture worker gone; dropped capture for id={}",
                    request.event.identity
                );
                false
            }
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Drain the queue, stop the worker and return final stats.
    pub fn shutdown(mut self) -> Result<CaptureStats> {
        self.tx.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("capture worker thread panicked"))?;
        }
        Ok(self.counters.snapshot())
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_worker<S: CaptureStore>(mut store: S, rx: Receiver<CaptureRequest>, counters: &Counters) {
    for request in rx {
        match store.persist(&request) {
            Ok(path) => {
                counters.persisted.fetch_add(1, Ordering::Relaxed);
                log::info!("capture saved: {}", path.display());
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "capture for id={} failed: {:#}",
                    request.event.identity,
                    err
                );
            }
        }
    }
}
