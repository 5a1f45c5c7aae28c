//! Asynchronous frame loading with in-flight dedup and bounded retry.
//!
//! Worker threads only fetch and decode. The cache and the in-flight set are
//! owned by the thread holding the `FrameLoader` and are mutated there alone:
//!   - `load()` checks the cache, then the in-flight set, marks the index and
//!     sends the request
//!   - `drain()` / `wait()` receive results, clear the in-flight mark and
//!     insert successful frames
//!
//! Checking the in-flight set as well as the cache closes the gap between a
//! worker finishing a frame and the owner receiving it; without it the same
//! frame would be requested twice.
//!
//! Outstanding fetches are never cancelled. After `shutdown()` workers finish
//! what they hold and their results are dropped with the channel.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, trace, warn};

use crate::cache::FrameCache;
use crate::error::FrameError;
use crate::sequence::FrameIndex;
use crate::source::{FrameResource, FrameSource};

struct FetchRequest {
    index: FrameIndex,
    retries: u32,
}

struct FetchResult {
    index: FrameIndex,
    result: Result<FrameResource, FrameError>,
}

/// Immediate answer to a `load()` call.
pub enum LoadRequest {
    /// Already cached; no I/O was performed.
    Ready(Arc<FrameResource>),
    /// A fetch for this index is outstanding. Nothing new was issued and this
    /// caller will not be told when it resolves.
    AlreadyInFlight,
    /// A fetch was issued; its outcome arrives through `drain()` / `wait()`.
    Dispatched,
    /// The loader has been shut down.
    Closed,
}

/// Completion of a dispatched fetch, after it has been applied to the cache.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(FrameIndex),
    Failed(FrameError),
}

impl LoadOutcome {
    pub fn index(&self) -> FrameIndex {
        match self {
            LoadOutcome::Loaded(index) => *index,
            LoadOutcome::Failed(e) => e.index().unwrap_or_default(),
        }
    }
}

pub struct FrameLoader {
    req_tx: Option<mpsc::Sender<FetchRequest>>,
    res_rx: mpsc::Receiver<FetchResult>,
    workers: usize,
}

impl FrameLoader {
    /// Start `workers` fetch threads (at least one) reading from `source`.
    pub fn spawn(source: Arc<dyn FrameSource>, workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let (req_tx, req_rx) = mpsc::channel::<FetchRequest>();
        let (res_tx, res_rx) = mpsc::channel::<FetchResult>();
        let req_rx = Arc::new(Mutex::new(req_rx));

        for n in 0..workers {
            let req_rx = Arc::clone(&req_rx);
            let res_tx = res_tx.clone();
            let source = Arc::clone(&source);
            thread::Builder::new()
                .name(format!("frame-loader-{n}"))
                .spawn(move || {
                    debug!("loader worker {n}: started");
                    loop {
                        // Hold the lock only while waiting for a request.
                        let req = match req_rx.lock() {
                            Ok(rx) => rx.recv(),
                            Err(_) => break,
                        };
                        let Ok(FetchRequest { index, retries }) = req else {
                            break;
                        };
                        let started = Instant::now();
                        let result = fetch_with_retry(source.as_ref(), index, retries);
                        trace!(
                            "loader worker {n}: frame {index} done in {:.1}ms (ok={})",
                            started.elapsed().as_secs_f64() * 1000.0,
                            result.is_ok()
                        );
                        if res_tx.send(FetchResult { index, result }).is_err() {
                            debug!("loader worker {n}: owner gone, dropping frame {index}");
                        }
                    }
                    debug!("loader worker {n}: channel closed, exiting");
                })?;
        }

        Ok(Self {
            req_tx: Some(req_tx),
            res_rx,
            workers,
        })
    }

    /// Number of concurrent fetches the loader can run.
    pub fn capacity(&self) -> usize {
        self.workers
    }

    pub fn is_closed(&self) -> bool {
        self.req_tx.is_none()
    }

    /// Request frame `index`, retrying a failed fetch up to `retries` times.
    pub fn load(&self, cache: &mut FrameCache, index: FrameIndex, retries: u32) -> LoadRequest {
        if let Some(res) = cache.get(index) {
            return LoadRequest::Ready(Arc::clone(res));
        }
        if cache.is_in_flight(index) {
            trace!("loader: frame {index} already in flight");
            return LoadRequest::AlreadyInFlight;
        }
        let Some(tx) = &self.req_tx else {
            return LoadRequest::Closed;
        };
        cache.mark_in_flight(index);
        if tx.send(FetchRequest { index, retries }).is_err() {
            cache.clear_in_flight(index);
            return LoadRequest::Closed;
        }
        trace!("loader: dispatched frame {index}");
        LoadRequest::Dispatched
    }

    /// Apply every completion that has already arrived. Never blocks.
    pub fn drain(&self, cache: &mut FrameCache) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(done) = self.res_rx.try_recv() {
            outcomes.push(complete(cache, done));
        }
        outcomes
    }

    /// Block for at most `timeout` until one completion arrives and apply it.
    pub fn wait(&self, cache: &mut FrameCache, timeout: Duration) -> Option<LoadOutcome> {
        match self.res_rx.recv_timeout(timeout) {
            Ok(done) => Some(complete(cache, done)),
            Err(_) => None,
        }
    }

    /// Stop accepting requests. Idempotent; fetches already handed to a
    /// worker still run to completion.
    pub fn shutdown(&mut self) {
        if self.req_tx.take().is_some() {
            debug!("loader: shut down");
        }
    }
}

impl Drop for FrameLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn complete(cache: &mut FrameCache, done: FetchResult) -> LoadOutcome {
    let FetchResult { index, result } = done;
    cache.clear_in_flight(index);
    match result {
        Ok(resource) => {
            cache.insert(index, Arc::new(resource));
            LoadOutcome::Loaded(index)
        }
        Err(e) => {
            warn!("loader: {e}");
            LoadOutcome::Failed(e)
        }
    }
}

/// Fetch `index`, making up to `retries + 1` attempts.
pub fn fetch_with_retry(
    source: &dyn FrameSource,
    index: FrameIndex,
    retries: u32,
) -> Result<FrameResource, FrameError> {
    let attempts = retries + 1;
    let mut reason = String::new();
    for attempt in 1..=attempts {
        match source.fetch(index) {
            Ok(resource) => return Ok(resource),
            Err(e) => {
                debug!("loader: frame {index} attempt {attempt}/{attempts} failed: {e:#}");
                reason = format!("{e:#}");
            }
        }
    }
    Err(FrameError::ResourceLoad {
        index,
        attempts,
        reason,
    })
}
