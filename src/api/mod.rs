use anyhow::{anyhow, Result};
use serde::Serialize;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::{list_captures, DEFAULT_CAPTURE_DIR};
use crate::slots::{StatusBoard, ZoneReport};

const MAX_REQUEST_BYTES: u64 = 8192;

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    /// Directory listed by `/captures`.
    pub capture_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_API_ADDR.to_string(),
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

/// Read-only status interface over the latest published snapshot.
pub struct ApiServer {
    cfg: ApiConfig,
    board: StatusBoard,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, board: StatusBoard) -> Self {
        Self { cfg, board }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let board = self.board;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, &cfg, &board, shutdown_thread) {
                log::error!("status api stopped: {}", err);
            }
        });
        log::info!("status api listening on http://{}", addr);

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: &ApiConfig,
    board: &StatusBoard,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, cfg, board) {
                    log::warn!("status api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ZonesBody<'a> {
    frame_index: Option<u64>,
    zones: &'a [ZoneReport],
}

#[derive(Serialize)]
struct CapturesBody {
    captures: Vec<String>,
}

fn handle_connection(mut stream: TcpStream, cfg: &ApiConfig, board: &StatusBoard) -> Result<()> {
    // Accepted sockets may inherit the listener's nonblocking flag.
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let (method, path) = read_request(&stream)?;
    if method != "GET" {
        write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        return Ok(());
    }

    match path.as_str() {
        "/health" => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        "/status" => {
            let snapshot = board.snapshot();
            let payload = serde_json::to_vec(&snapshot.counters)?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        "/zones" => {
            let snapshot = board.snapshot();
            let payload = serde_json::to_vec(&ZonesBody {
                frame_index: snapshot.frame_index,
                zones: &snapshot.zones,
            })?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        "/captures" => match list_captures(&cfg.capture_dir) {
            Ok(captures) => {
                let payload = serde_json::to_vec(&CapturesBody { captures })?;
                write_response(&mut stream, 200, "application/json", &payload)
            }
            Err(err) => {
                write_json_response(&mut stream, 500, r#"{"error":"capture_listing_failed"}"#)?;
                Err(err)
            }
        },
        "/frame.jpg" => match board.snapshot().frame_jpeg.clone() {
            Some(jpeg) => write_response(&mut stream, 200, "image/jpeg", &jpeg),
            None => write_json_response(&mut stream, 404, r#"{"error":"no_frame"}"#),
        },
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

/// Method and path of the request line. Headers are read and dropped.
fn read_request(stream: &TcpStream) -> Result<(String, String)> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_BYTES));
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    // Unread bytes at close would reset the connection under the response.
    let mut header = String::new();
    while reader.read_line(&mut header)? > 2 {
        header.clear();
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("empty request"))?;
    let target = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = target.split('?').next().unwrap_or(target);
    Ok((method.to_string(), path.to_string()))
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

