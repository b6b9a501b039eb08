//! Shared utilities for integration testing: a scriptable origin server and
//! a relay bound to an ephemeral port.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bandwidth_relay::relay::{
    ImageTranscoder, RelayError, TranscodeOptions, Transcoded, Transcoder,
};
use bandwidth_relay::{RelayConfig, RelayServer, Shutdown};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A request as the origin saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the origin answers with.
#[derive(Debug, Clone)]
pub struct OriginReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl OriginReply {
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), content_type.into())],
            body,
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: b"origin error".to_vec(),
            delay: None,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".into(), location.into())],
            body: Vec::new(),
            delay: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub type SeenLog = Arc<Mutex<Vec<SeenRequest>>>;

/// Start an origin that answers every request through `f`.
pub async fn start_origin<F>(f: F) -> (SocketAddr, SeenLog)
where
    F: Fn(&SeenRequest) -> OriginReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenLog = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);
    let log = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let f = f.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                log.lock().unwrap().push(request.clone());
                let reply = f(&request);
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }
                let _ = socket.write_all(&render(&reply)).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.split("\r\n");
    let path = lines.next()?.split(' ').nth(1)?.to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    Some(SeenRequest { path, headers })
}

fn render(reply: &OriginReply) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {} Origin\r\n", reply.status);
    for (name, value) in &reply.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if !reply
        .headers
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("content-length"))
    {
        head.push_str(&format!("Content-Length: {}\r\n", reply.body.len()));
    }
    head.push_str("Connection: close\r\n\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(&reply.body);
    out
}

/// A running relay and the handle that stops it.
pub struct TestRelay {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestRelay {
    pub fn url(&self, query: &str) -> String {
        format!("http://{}/?{}", self.addr, query)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_relay(config: RelayConfig) -> TestRelay {
    start_relay_with(config, Arc::new(ImageTranscoder)).await
}

pub async fn start_relay_with(config: RelayConfig, transcoder: Arc<dyn Transcoder>) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = RelayServer::with_transcoder(config, transcoder);

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestRelay { addr, shutdown }
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Percent-encode a target URL for use as the `url` parameter.
pub fn target(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}

/// Wraps a transcoder and remembers every set of options it was given.
#[derive(Default)]
pub struct RecordingTranscoder {
    pub calls: Mutex<Vec<TranscodeOptions>>,
    /// When set, return this many bytes instead of really encoding.
    pub fixed_output: Option<usize>,
}

impl RecordingTranscoder {
    pub fn fixed(size: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fixed_output: Some(size),
        }
    }

    pub fn calls(&self) -> Vec<TranscodeOptions> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transcoder for RecordingTranscoder {
    fn transcode(&self, data: &[u8], options: TranscodeOptions) -> Result<Transcoded, RelayError> {
        self.calls.lock().unwrap().push(options);
        match self.fixed_output {
            Some(size) => Ok(Transcoded::new(vec![0xAB; size], options.format)),
            None => ImageTranscoder.transcode(data, options),
        }
    }
}

/// A colorful, noisy image so encoders have something to work with.
pub fn sample_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let n = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) as u8;
        Rgb([n, (x * 3) as u8, (y * 5) as u8])
    }))
}

pub fn encode(img: &DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn sample_jpeg() -> Vec<u8> {
    encode(&sample_image(64, 64), ImageOutputFormat::Jpeg(95))
}

pub fn sample_png() -> Vec<u8> {
    encode(&sample_image(64, 64), ImageOutputFormat::Png)
}
