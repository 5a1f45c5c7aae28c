//! Preload scheduling around the frame the user is heading to.
//!
//! Immediate neighbours of the center are dispatched at once. The rest of the
//! window waits in a low-priority queue that is drained only when the owner
//! reports idle time and the loader has free workers, so it never delays
//! input handling or the neighbours of a later scroll position. Without an
//! idle facility the queue is flushed at the start of the next tick instead.

use std::collections::VecDeque;
use std::time::Instant;

use log::{debug, trace};
use serde::Deserialize;

use crate::cache::FrameCache;
use crate::loader::{FrameLoader, LoadRequest};
use crate::sequence::FrameIndex;

/// Distance from the center within which frames load immediately.
pub const PRIORITY_RADIUS: u32 = 2;

/// How low-priority loads get executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleStrategy {
    /// Dispatch during idle time left over after a tick.
    #[default]
    Idle,
    /// Dispatch everything queued at the start of the next tick.
    Deferred,
}

pub struct PreloadScheduler {
    total_frames: u32,
    batch_size: u32,
    max_cache_size: usize,
    retries: u32,
    strategy: IdleStrategy,
    queue: VecDeque<FrameIndex>,
}

impl PreloadScheduler {
    pub fn new(
        total_frames: u32,
        batch_size: u32,
        max_cache_size: usize,
        retries: u32,
        strategy: IdleStrategy,
    ) -> Self {
        Self {
            total_frames,
            batch_size,
            max_cache_size,
            retries,
            strategy,
            queue: VecDeque::new(),
        }
    }

    /// Inclusive preload window around `center`, clamped to the sequence.
    pub fn window(&self, center: FrameIndex) -> (FrameIndex, FrameIndex) {
        let start = center.saturating_sub(self.batch_size).max(1);
        let end = center
            .saturating_add(self.batch_size)
            .min(self.total_frames);
        (start, end)
    }

    /// Schedule loads for the window around `center`, then evict far frames.
    /// Queued indices left over from an earlier center that fall outside the
    /// new window are dropped; the rest are ordered by distance to `center`.
    pub fn preload(&mut self, center: FrameIndex, cache: &mut FrameCache, loader: &FrameLoader) {
        let (start, end) = self.window(center);
        let window = start..=end;
        let stale = self.queue.len();
        self.queue.retain(|i| window.contains(i));
        let stale = stale - self.queue.len();
        let mut immediate = 0;
        for i in start..=end {
            if i.abs_diff(center) <= PRIORITY_RADIUS {
                if matches!(loader.load(cache, i, self.retries), LoadRequest::Dispatched) {
                    immediate += 1;
                }
            } else if !cache.contains(i) && !cache.is_in_flight(i) && !self.queue.contains(&i) {
                self.queue.push_back(i);
            }
        }
        // Nearest first; ties keep insertion order.
        self.queue
            .make_contiguous()
            .sort_by_key(|i| i.abs_diff(center));
        let evicted = cache.evict(center, self.max_cache_size);
        debug!(
            "preload: center={center} window={start}..={end} immediate={immediate} queued={} dropped={stale} evicted={evicted}",
            self.queue.len()
        );
    }

    pub fn strategy(&self) -> IdleStrategy {
        self.strategy
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Idle-time facility: dispatch queued loads while `deadline` has not
    /// passed and the loader has a free worker. Returns the number dispatched.
    pub fn run_idle(&mut self, deadline: Instant, cache: &mut FrameCache, loader: &FrameLoader) -> usize {
        let mut dispatched = 0;
        while Instant::now() < deadline && cache.in_flight_count() < loader.capacity() {
            let Some(i) = self.queue.pop_front() else {
                break;
            };
            if matches!(loader.load(cache, i, self.retries), LoadRequest::Dispatched) {
                dispatched += 1;
            }
        }
        if dispatched > 0 {
            trace!("preload: idle dispatched {dispatched}, {} left", self.queue.len());
        }
        dispatched
    }

    /// Deferred-execution fallback: dispatch everything queued.
    pub fn flush_deferred(&mut self, cache: &mut FrameCache, loader: &FrameLoader) -> usize {
        let mut dispatched = 0;
        while let Some(i) = self.queue.pop_front() {
            if matches!(loader.load(cache, i, self.retries), LoadRequest::Dispatched) {
                dispatched += 1;
            }
        }
        dispatched
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
