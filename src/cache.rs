use std::collections::{HashMap, VecDeque};

use crate::error::FetchError;
use crate::fetcher::{CancelToken, FetchCompletion, FetchId, FetchLauncher, FetchRequest};
use crate::record::ImageRecord;

pub const MIN_CAPACITY: usize = 1;
pub const MAX_CAPACITY: usize = 20;

/// What a completion did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Completion belonged to a request that was cancelled or superseded.
    Stale,
    Cancelled,
    /// New image appended to the queue.
    Stored,
    /// Queue was already full; image discarded.
    Dropped,
    Failed(FetchError),
    /// Nothing queued, nothing in flight, and the last attempt failed.
    Exhausted(FetchError),
}

// ---------------------------------------------------------------------------
// Prefetch cache
// ---------------------------------------------------------------------------

/// Bounded FIFO of fetched-but-unshown images. `queued + in_flight` never
/// exceeds `capacity`.
pub struct PrefetchCache<L> {
    queue: VecDeque<ImageRecord>,
    in_flight: HashMap<FetchId, CancelToken>,
    capacity: usize,
    source_url: String,
    /// Consecutive failed fetches since the last success or retry.
    failure_streak: usize,
    launcher: L,
}

impl<L: FetchLauncher> PrefetchCache<L> {
    pub fn new(capacity: usize, source_url: impl Into<String>, launcher: L) -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
            capacity: capacity.clamp(MIN_CAPACITY, MAX_CAPACITY),
            source_url: source_url.into(),
            failure_streak: 0,
            launcher,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    /// Launch enough fetches to cover the deficit. Returns how many were started.
    pub fn ensure_filled(&mut self) -> usize {
        let deficit = self
            .capacity
            .saturating_sub(self.queue.len() + self.in_flight.len());
        for _ in 0..deficit {
            let request = FetchRequest {
                id: FetchId::next(),
                url: self.source_url.clone(),
                cancel: CancelToken::new(),
            };
            self.in_flight.insert(request.id, request.cancel.clone());
            self.launcher.launch(request);
        }
        if deficit > 0 {
            log::debug!(
                "[cache] launched {} fetch(es), {} queued / {} in flight / cap {}",
                deficit,
                self.queue.len(),
                self.in_flight.len(),
                self.capacity
            );
        }
        deficit
    }

    /// User-initiated attempt: forget earlier failures and refill.
    pub fn retry(&mut self) -> usize {
        self.failure_streak = 0;
        self.ensure_filled()
    }

    pub fn on_completion(&mut self, completion: FetchCompletion) -> CacheEvent {
        if self.in_flight.remove(&completion.id).is_none() {
            log::debug!("[cache] discarding stale completion {:?}", completion.id);
            return CacheEvent::Stale;
        }

        match completion.result {
            Ok(record) => {
                self.failure_streak = 0;
                let event = if self.queue.len() < self.capacity {
                    self.queue.push_back(record);
                    CacheEvent::Stored
                } else {
                    log::warn!("[cache] queue full, dropping {}", record.source_url());
                    CacheEvent::Dropped
                };
                self.ensure_filled();
                event
            }
            Err(FetchError::Cancelled) => CacheEvent::Cancelled,
            Err(err) => {
                self.failure_streak += 1;
                log::warn!(
                    "[cache] fetch failed ({} in a row): {}",
                    self.failure_streak,
                    err
                );
                if self.queue.is_empty() && self.in_flight.is_empty() {
                    return CacheEvent::Exhausted(err);
                }
                if self.failure_streak < self.capacity {
                    self.ensure_filled();
                }
                CacheEvent::Failed(err)
            }
        }
    }

    /// Take the oldest queued image. Call `ensure_filled` afterwards.
    pub fn pop_front(&mut self) -> Option<ImageRecord> {
        self.queue.pop_front()
    }

    /// Cancel and forget every outstanding fetch. Their completions become stale.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.in_flight.len();
        for (_, token) in self.in_flight.drain() {
            token.cancel();
        }
        n
    }

    /// Switch source and size. Nothing fetched under the old settings survives.
    pub fn reconfigure(&mut self, capacity: usize, source_url: impl Into<String>) -> usize {
        let cancelled = self.cancel_all();
        let cleared = self.queue.len();
        self.queue.clear();
        self.capacity = capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        self.source_url = source_url.into();
        self.failure_streak = 0;
        log::info!(
            "[cache] reconfigured: cap {} url {} (cancelled {}, cleared {})",
            self.capacity,
            self.source_url,
            cancelled,
            cleared
        );
        self.ensure_filled()
    }

    #[cfg(test)]
    pub(crate) fn check_invariant(&self) {
        assert!(
            self.queue.len() + self.in_flight.len() <= self.capacity,
            "{} queued + {} in flight > cap {}",
            self.queue.len(),
            self.in_flight.len(),
            self.capacity
        );
    }
}
