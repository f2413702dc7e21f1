//! parkwatchd - parking lane violation monitor daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured source (synthetic or image sequence)
//! 2. Runs the detector adapter on each frame
//! 3. Assigns detections to zones, stabilizes boxes and times violations
//! 4. Hands sustained-violation crops to the capture worker
//! 5. Publishes slot counters (and the annotated frame) to the status API

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parkwatch::frame::encode_jpeg;
use parkwatch::{
    open_source, overlay, ApiServer, CaptureRequest, CaptureWorker, DetectorBackend, Engine,
    EngineState, FilesystemCaptureStore, ParkwatchConfig, ReplayBackend, ScriptedBackend,
    StatusBoard,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const FRAME_JPEG_QUALITY: u8 = 80;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension). Overrides PARKWATCH_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = ParkwatchConfig::load_from(args.config.as_deref())?;
    let engine = Engine::new(cfg.zone_set()?, cfg.engine_settings()?);
    let catalog = cfg.class_catalog()?;
    log::info!(
        "parkwatchd {} monitoring {} zones; classes={:?} threshold={:.1}s policy={:?}",
        env!("CARGO_PKG_VERSION"),
        engine.zones().len(),
        cfg.allowed_classes,
        cfg.capture.threshold.as_secs_f64(),
        cfg.capture.policy
    );

    let mut detector: Box<dyn DetectorBackend> = match &cfg.detector.replay_path {
        Some(path) => Box::new(ReplayBackend::open(path)?),
        None => {
            log::warn!("no detector configured; frames will carry no detections");
            Box::new(ScriptedBackend::new(Vec::new()))
        }
    };
    detector.warm_up()?;

    let board = StatusBoard::new();
    let api_handle = ApiServer::new(cfg.api_config(), board.clone()).spawn()?;

    let store = FilesystemCaptureStore::new(&cfg.capture.dir)?;
    log::info!("captures written to {}", store.dir().display());
    let capture_worker = CaptureWorker::spawn(store, cfg.capture.queue)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let mut source = open_source(cfg.source.clone())?;
    source.connect()?;

    let frame_interval = Duration::from_secs_f64(1.0 / cfg.source.target_fps as f64);
    let mut state = EngineState::new();
    let mut last_health_log = Instant::now();
    let mut captures_emitted = 0u64;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source ended");
                break;
            }
            Err(e) => {
                log::warn!("frame skipped: {:#}", e);
                continue;
            }
        };

        let raw = match detector.detect(&frame) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("detector {} failed on frame {}: {:#}", detector.name(), frame.index, e);
                Vec::new()
            }
        };
        let detections = catalog.label_detections(&raw);
        let report = engine.process_frame(&mut state, frame.captured_at, &detections);

        for event in report.captures.iter().cloned() {
            captures_emitted += 1;
            match CaptureRequest::from_frame(&frame, event) {
                Some(request) => {
                    capture_worker.submit(request);
                }
                None => log::warn!("capture box outside frame {}; skipped", frame.index),
            }
        }

        let violating = report.assignment.violating_zones(engine.zones());
        log::debug!(
            "frame {}: empty={} occupied={} violating={} violators={} zones={:?}",
            report.frame_index,
            report.counters.empty_slots,
            report.counters.occupied_slots,
            report.counters.violation_slots,
            report.assignment.total_violators(),
            violating
        );

        let mut snapshot = engine.snapshot(&report);
        if cfg.annotate {
            let annotated = overlay::annotate(&frame, engine.zones(), &report);
            match encode_jpeg(&annotated, FRAME_JPEG_QUALITY) {
                Ok(jpeg) => snapshot.frame_jpeg = Some(Arc::new(jpeg)),
                Err(e) => log::warn!("annotated frame not published: {:#}", e),
            }
        }
        board.publish(snapshot);

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            let capture_stats = capture_worker.stats();
            log::info!(
                "source health={} frames={} path={} captures emitted={} persisted={} failed={} dropped={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.path,
                captures_emitted,
                capture_stats.persisted,
                capture_stats.failed,
                capture_stats.dropped
            );
            last_health_log = Instant::now();
        }

        if let Some(remaining) = frame_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    log::info!("shutting down after {} frames", state.frames_processed());
    let capture_stats = capture_worker.shutdown()?;
    log::info!(
        "captures persisted={} failed={} dropped={}",
        capture_stats.persisted,
        capture_stats.failed,
        capture_stats.dropped
    );
    api_handle.stop()?;
    Ok(())
}
