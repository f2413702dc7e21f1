use anyhow::Result;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use parkwatch::api::{ApiConfig, ApiHandle, ApiServer};
use parkwatch::geometry::{reference_zones, DEFAULT_LANE_INSET};
use parkwatch::{
    BoundingBox, Detection, Engine, EngineSettings, EngineState, StatusBoard, ZoneSet,
};

fn read_response(stream: &mut TcpStream) -> Result<(String, Vec<u8>)> {
    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or(response.len());
    let headers = String::from_utf8_lossy(&response[..split]).to_string();
    let body = response.get(split + 4..).unwrap_or_default().to_vec();
    Ok((headers, body))
}

fn get(handle: &ApiHandle, path: &str) -> Result<(String, Vec<u8>)> {
    let mut stream = TcpStream::connect(handle.addr)?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(request.as_bytes())?;
    read_response(&mut stream)
}

struct TestApi {
    board: StatusBoard,
    api_handle: Option<ApiHandle>,
}

impl TestApi {
    fn new(capture_dir: &Path) -> Result<Self> {
        let board = StatusBoard::new();
        let api_config = ApiConfig {
            addr: "127.0.0.1:0".to_string(),
            capture_dir: capture_dir.to_path_buf(),
        };
        let api_handle = ApiServer::new(api_config, board.clone()).spawn()?;
        Ok(Self {
            board,
            api_handle: Some(api_handle),
        })
    }

    fn handle(&self) -> &ApiHandle {
        self.api_handle
            .as_ref()
            .expect("test API handle should be initialized")
    }

    /// Publish the snapshot of one frame with a violator in area1 and a
    /// parked car in area2.
    fn publish_frame(&self) {
        let zones = ZoneSet::new(reference_zones(), DEFAULT_LANE_INSET).unwrap();
        let engine = Engine::new(zones, EngineSettings::default());
        let detections = vec![
            Detection::new(0, BoundingBox::new(115, 235, 155, 265), "car"),
            Detection::new(1, BoundingBox::new(296, 213, 336, 243), "car"),
        ];
        let report = engine.process_frame(&mut EngineState::new(), chrono::Local::now(), &detections);
        let mut snapshot = engine.snapshot(&report);
        snapshot.frame_jpeg = Some(Arc::new(vec![0xFF, 0xD8, 0xFF, 0xD9]));
        self.board.publish(snapshot);
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(handle) = self.api_handle.take() {
            handle.stop().expect("failed to stop API server");
        }
    }
}

#[test]
fn health_endpoint_reports_ok() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;
    let (headers, body) = get(api.handle(), "/health")?;
    assert!(headers.contains("200 OK"));
    assert!(String::from_utf8(body)?.contains(r#""status":"ok""#));
    Ok(())
}

#[test]
fn status_reports_zero_counters_before_first_frame() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;
    let (headers, body) = get(api.handle(), "/status")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_slice(&body)?;
    assert_eq!(value["empty_slots"], 0);
    assert_eq!(value["occupied_slots"], 0);
    assert_eq!(value["violation_slots"], 0);
    Ok(())
}

#[test]
fn status_reports_latest_frame_counters() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;
    api.publish_frame();

    let (headers, body) = get(api.handle(), "/status")?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("application/json"));
    let value: Value = serde_json::from_slice(&body)?;
    assert_eq!(value["empty_slots"], 5);
    assert_eq!(value["occupied_slots"], 1);
    assert_eq!(value["violation_slots"], 1);
    Ok(())
}

#[test]
fn zones_endpoint_lists_every_zone_in_order() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;
    api.publish_frame();

    let (headers, body) = get(api.handle(), "/zones")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_slice(&body)?;
    assert_eq!(value["frame_index"], 0);
    let zones = value["zones"].as_array().unwrap();
    assert_eq!(zones.len(), 7);
    assert_eq!(zones[0]["name"], "area1");
    assert_eq!(zones[0]["status"], "violating");
    assert_eq!(zones[0]["violators"], 1);
    assert_eq!(zones[1]["status"], "occupied");
    assert_eq!(zones[6]["status"], "empty");
    Ok(())
}

#[test]
fn captures_endpoint_lists_sorted_images() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("violation_3_20240501_093005.jpg"), b"x")?;
    std::fs::write(dir.path().join("violation_1_20240501_093004.jpg"), b"x")?;
    std::fs::write(dir.path().join("readme.txt"), b"x")?;
    let api = TestApi::new(dir.path())?;

    let (headers, body) = get(api.handle(), "/captures")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_slice(&body)?;
    assert_eq!(
        value["captures"],
        serde_json::json!([
            "violation_1_20240501_093004.jpg",
            "violation_3_20240501_093005.jpg"
        ])
    );
    Ok(())
}

#[test]
fn frame_endpoint_serves_latest_jpeg() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;

    let (headers, _) = get(api.handle(), "/frame.jpg")?;
    assert!(headers.contains("404 Not Found"));

    api.publish_frame();
    let (headers, body) = get(api.handle(), "/frame.jpg")?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("image/jpeg"));
    assert_eq!(body, vec![0xFF, 0xD8, 0xFF, 0xD9]);
    Ok(())
}

#[test]
fn unknown_paths_and_methods_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;

    let (headers, _) = get(api.handle(), "/events")?;
    assert!(headers.contains("404 Not Found"));

    let mut stream = TcpStream::connect(api.handle().addr)?;
    stream.write_all(b"POST /status HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    let (headers, body) = read_response(&mut stream)?;
    assert!(headers.contains("405 Method Not Allowed"));
    assert!(String::from_utf8(body)?.contains("method_not_allowed"));
    Ok(())
}

#[test]
fn query_strings_and_extra_headers_are_ignored() -> Result<()> {
    let dir = tempdir()?;
    let api = TestApi::new(dir.path())?;

    let mut stream = TcpStream::connect(api.handle().addr)?;
    stream.write_all(
        b"GET /health?verbose=1 HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\nUser-Agent: curl/8.5.0\r\n\r\n",
    )?;
    let (headers, body) = read_response(&mut stream)?;
    assert!(headers.contains("200 OK"));
    let json: Value = serde_json::from_slice(&body)?;
    assert_eq!(json["status"], "ok");
    Ok(())
}
