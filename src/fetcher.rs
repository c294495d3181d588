use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::FetchError;
use crate::record::{Frame, ImageRecord};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CHUNK_SIZE: usize = 8192;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag handed to each fetch at launch. Checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Request / completion messages
// ---------------------------------------------------------------------------

static NEXT_FETCH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(u64);

impl FetchId {
    pub fn next() -> Self {
        FetchId(NEXT_FETCH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub id: FetchId,
    pub url: String,
    pub cancel: CancelToken,
}

/// Result of one fetch, delivered back to the controller's thread.
#[derive(Debug)]
pub struct FetchCompletion {
    pub id: FetchId,
    pub result: Result<ImageRecord, FetchError>,
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

/// Blocking HTTP client shared by every fetch thread. The underlying
/// reqwest client pools connections and is safe to use concurrently.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Client whose whole request, body included, must finish within `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET `url`, stream the body and validate it as an image.
    pub fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<ImageRecord, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(map_reqwest_error)?;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let resolved_url = response.url().to_string();
        let bytes = read_body(response, cancel)?;
        into_record(bytes, resolved_url)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

fn map_io_error(e: io::Error) -> FetchError {
    // reqwest reports body timeouts as ErrorKind::Other wrapping its own error.
    let wrapped_timeout = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(reqwest::Error::is_timeout);
    if wrapped_timeout {
        return FetchError::Timeout;
    }
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FetchError::Timeout,
        _ => FetchError::Network(e.to_string()),
    }
}

/// Read everything from `body` in fixed chunks, bailing out as soon as the
/// token is cancelled.
pub fn read_body<R: Read>(mut body: R, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
    let mut data = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        match body.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_io_error(e)),
        }
    }
    Ok(data)
}

/// Validate a downloaded payload and wrap it in a record.
pub fn into_record(bytes: Vec<u8>, resolved_url: String) -> Result<ImageRecord, FetchError> {
    if bytes.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    let frame = Frame::decode(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(ImageRecord::new(bytes, resolved_url, frame))
}

// ---------------------------------------------------------------------------
// Launching
// ---------------------------------------------------------------------------

/// Starts fetches off the controller's thread. Completions come back through
/// whatever channel the implementation was built with, never as a return value.
pub trait FetchLauncher {
    fn launch(&mut self, request: FetchRequest);

    /// Wait up to `grace` for outstanding work, then abandon it.
    fn shutdown(&mut self, _grace: Duration) {}
}

/// One OS thread per request. `sink` is called exactly once per launched
/// request, from the fetch thread.
pub struct ThreadLauncher<S> {
    fetcher: HttpFetcher,
    sink: S,
    workers: Vec<JoinHandle<()>>,
}

impl<S> ThreadLauncher<S>
where
    S: Fn(FetchCompletion) + Clone + Send + 'static,
{
    pub fn new(fetcher: HttpFetcher, sink: S) -> Self {
        Self {
            fetcher,
            sink,
            workers: Vec::new(),
        }
    }

    fn reap_finished(&mut self) {
        self.workers.retain(|h| !h.is_finished());
    }
}

impl<S> FetchLauncher for ThreadLauncher<S>
where
    S: Fn(FetchCompletion) + Clone + Send + 'static,
{
    fn launch(&mut self, request: FetchRequest) {
        self.reap_finished();

        let fetcher = self.fetcher.clone();
        let sink = self.sink.clone();
        let FetchRequest { id, url, cancel } = request;

        let spawned = thread::Builder::new()
            .name(format!("fetch-{}", id.0))
            .spawn(move || {
                let started = Instant::now();
                let result = fetcher.fetch(&url, &cancel);
                match &result {
                    Ok(rec) => log::debug!(
                        "[fetch {}] {} bytes from {} in {:.2}s",
                        id.0,
                        rec.bytes().len(),
                        rec.source_url(),
                        started.elapsed().as_secs_f64()
                    ),
                    Err(e) => log::debug!("[fetch {}] {}: {}", id.0, url, e),
                }
                sink(FetchCompletion { id, result });
            });

        match spawned {
            Ok(handle) => self.workers.push(handle),
            Err(e) => {
                log::warn!("could not spawn fetch thread: {}", e);
                (self.sink)(FetchCompletion {
                    id,
                    result: Err(FetchError::Network(format!("spawn failed: {}", e))),
                });
            }
        }
    }

    fn shutdown(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;
        loop {
            self.reap_finished();
            if self.workers.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if !self.workers.is_empty() {
            log::warn!(
                "abandoning {} fetch thread(s) still running after {:?}",
                self.workers.len(),
                grace
            );
            self.workers.clear();
        }
    }
}
