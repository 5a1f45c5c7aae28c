//! Bounded store of decoded frames plus the in-flight set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::trace;

use crate::sequence::FrameIndex;
use crate::source::FrameResource;

/// Decoded frames keyed by index, and the indices currently being fetched.
///
/// An index is never resolved and in flight at the same time: the loader only
/// marks uncached indices, and completion clears the mark before inserting.
/// Iteration order is irrelevant.
#[derive(Default)]
pub struct FrameCache {
    data: HashMap<FrameIndex, Arc<FrameResource>>,
    in_flight: HashSet<FrameIndex>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: FrameIndex) -> Option<&Arc<FrameResource>> {
        self.data.get(&index)
    }

    pub fn contains(&self, index: FrameIndex) -> bool {
        self.data.contains_key(&index)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, index: FrameIndex, resource: Arc<FrameResource>) {
        debug_assert!(!self.in_flight.contains(&index));
        self.data.insert(index, resource);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Proximity eviction: once the cache holds more than `max_size` entries,
    /// drop every entry farther than `max_size / 2` from `center`. Returns the
    /// number evicted.
    pub fn evict(&mut self, center: FrameIndex, max_size: usize) -> usize {
        if self.data.len() <= max_size {
            return 0;
        }
        let radius = max_size as f64 / 2.0;
        let before = self.data.len();
        self.data.retain(|&k, _| {
            let keep = (k as f64 - center as f64).abs() <= radius;
            if !keep {
                trace!("cache: evict frame {k} (center={center})");
            }
            keep
        });
        before - self.data.len()
    }

    pub fn is_in_flight(&self, index: FrameIndex) -> bool {
        self.in_flight.contains(&index)
    }

    /// Returns false if the index was already in flight.
    pub fn mark_in_flight(&mut self, index: FrameIndex) -> bool {
        self.in_flight.insert(index)
    }

    pub fn clear_in_flight(&mut self, index: FrameIndex) {
        self.in_flight.remove(&index);
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}
