use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::{FrameHub, IncomingFrame};

const MAX_HEADER_BYTES: usize = 8192;
/// Largest encoded frame accepted in a request body.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;
const FRAMES_PATH_PREFIX: &str = "/frames/";
const IDLE_POLL: Duration = Duration::from_millis(20);
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Device identifiers are path segments and log fields; keep them plain.
pub fn validate_device_id(device_id: &str) -> Result<()> {
    static DEVICE_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = DEVICE_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9._-]{1,64}$").expect("valid regex"));
    if !re.is_match(device_id) {
        return Err(anyhow!(
            "device id must match ^[A-Za-z0-9._-]{{1,64}}$, got {:?}",
            device_id
        ));
    }
    Ok(())
}

/// HTTP/1.1 frame hub.
///
/// Serves one connection at a time. A device posts an encoded JPEG/PNG to
/// `/frames/<device_id>`; the connection is held open until `send_reply`
/// writes the acknowledgement. Bad requests are answered with a 4xx, logged
/// and skipped.
pub struct HttpFrameHub {
    listener: TcpListener,
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    pending: Option<TcpStream>,
}

impl HttpFrameHub {
    /// Bind `addr`. Setting `shutdown` makes an idle `recv_frame` return `None`.
    pub fn bind(addr: &str, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("bind frame hub on {}", addr))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            addr,
            shutdown,
            pending: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl FrameHub for HttpFrameHub {
    fn recv_frame(&mut self) -> Result<Option<IncomingFrame>> {
        if self.pending.is_some() {
            return Err(anyhow!("previous frame has not been acknowledged"));
        }
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(None);
            }
            let (mut stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(IDLE_POLL);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            stream.set_nonblocking(false)?;
            stream.set_read_timeout(Some(READ_TIMEOUT))?;

            match read_frame_request(&stream) {
                Ok(incoming) => {
                    self.pending = Some(stream);
                    return Ok(Some(incoming));
                }
                Err(rejection) => {
                    log::warn!(
                        "frame request from {} rejected ({}): {}",
                        peer,
                        rejection.status,
                        rejection.reason
                    );
                    let body = format!("{}\n", rejection.reason);
                    if let Err(err) = write_response(&mut stream, rejection.status, body.as_bytes())
                    {
                        log::debug!("failed to answer rejected request: {}", err);
                    }
                }
            }
        }
    }

    fn send_reply(&mut self, payload: &[u8]) -> Result<()> {
        let mut stream = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("no pending frame to acknowledge"))?;
        write_response(&mut stream, 200, payload).context("write frame acknowledgement")
    }
}

#[derive(Debug)]
struct Rejection {
    status: u16,
    reason: String,
}

impl Rejection {
    fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

fn read_frame_request(stream: &TcpStream) -> std::result::Result<IncomingFrame, Rejection> {
    let mut reader = BufReader::new(stream);

    let mut header_bytes = 0usize;
    let mut read_line = |reader: &mut BufReader<&TcpStream>| -> std::result::Result<String, Rejection> {
        let remaining = (MAX_HEADER_BYTES - header_bytes) as u64;
        let mut line = Vec::new();
        let n = reader
            .by_ref()
            .take(remaining)
            .read_until(b'\n', &mut line)
            .map_err(|e| Rejection::new(400, format!("read request: {}", e)))?;
        header_bytes += n;
        if !line.ends_with(b"\n") {
            if header_bytes >= MAX_HEADER_BYTES {
                return Err(Rejection::new(431, "request headers too large"));
            }
            return Err(Rejection::new(400, "connection closed before end of headers"));
        }
        Ok(String::from_utf8_lossy(&line)
            .trim_end_matches(['\r', '\n'])
            .to_string())
    };

    let request_line = read_line(&mut reader)?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Rejection::new(400, "empty request"))?
        .to_string();
    let raw_path = parts
        .next()
        .ok_or_else(|| Rejection::new(400, "missing path"))?
        .to_string();

    let mut content_length = None;
    loop {
        let line = read_line(&mut reader)?;
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            if k.trim().eq_ignore_ascii_case("content-length") {
                content_length = Some(
                    v.trim()
                        .parse::<usize>()
                        .map_err(|_| Rejection::new(400, "invalid content-length"))?,
                );
            }
        }
    }

    // Body is consumed before routing so a rejected request is answered
    // rather than reset.
    let len = content_length.ok_or_else(|| Rejection::new(411, "content-length required"))?;
    if len > MAX_FRAME_BYTES {
        return Err(Rejection::new(
            413,
            format!("frame of {} bytes exceeds {} byte limit", len, MAX_FRAME_BYTES),
        ));
    }
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| Rejection::new(400, format!("read frame body: {}", e)))?;

    let path = raw_path.split('?').next().unwrap_or(&raw_path);
    let device_id = path
        .strip_prefix(FRAMES_PATH_PREFIX)
        .ok_or_else(|| Rejection::new(404, format!("unknown path {}", path)))?;
    if method != "POST" {
        return Err(Rejection::new(405, format!("method {} not allowed", method)));
    }
    validate_device_id(device_id).map_err(|e| Rejection::new(400, e.to_string()))?;

    let frame = image::load_from_memory(&body)
        .map_err(|e| Rejection::new(400, format!("decode frame: {}", e)))?
        .into_rgb8();

    Ok(IncomingFrame {
        device_id: device_id.to_string(),
        frame,
    })
}

fn write_response(stream: &mut TcpStream, status: u16, body: &[u8]) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        411 => "HTTP/1.1 411 Length Required",
        413 => "HTTP/1.1 413 Payload Too Large",
        431 => "HTTP/1.1 431 Request Header Fields Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: text/plain\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_without_newline_is_capped() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut hub = HttpFrameHub::bind("127.0.0.1:0", shutdown.clone()).unwrap();
        let addr = hub.local_addr();

        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut request = b"POST /frames/".to_vec();
            request.resize(MAX_HEADER_BYTES, b'a');
            stream.write_all(&request).unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
            shutdown.store(true, Ordering::SeqCst);
            response
        });

        assert!(hub.recv_frame().unwrap().is_none());
        let response = client.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 431"), "{}", response);
    }

    #[test]
    fn device_ids_are_restricted() {
        assert!(validate_device_id("cam1").is_ok());
        assert!(validate_device_id("porch.pi-2_b").is_ok());
        assert!(validate_device_id("").is_err());
        assert!(validate_device_id("../etc").is_err());
        assert!(validate_device_id("front door").is_err());
        assert!(validate_device_id(&"x".repeat(65)).is_err());
    }
}
