//! Bounded cache of text measurements.
//!
//! Keys are `(font shorthand, text)`. When full, the oldest *inserted* entry
//! is evicted; lookups do not refresh recency, so eviction is FIFO. The cache
//! is dropped wholesale when the process is under memory pressure.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::memory::MemoryProbe;
use crate::surface::{FontDescriptor, TextMeasurer, TextMetrics};

/// Maximum number of cached measurements.
pub const DEFAULT_MEASURE_CAPACITY: usize = 1000;

type MeasureKey = (String, String);

pub struct MeasureCache {
    entries: LruCache<MeasureKey, TextMetrics>,
    pub hits: u64,
    pub misses: u64,
}

impl Default for MeasureCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEASURE_CAPACITY)
    }
}

impl std::fmt::Debug for MeasureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

impl MeasureCache {
    /// Create a cache holding at most `capacity` entries (minimum one).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Whether a measurement for `text` in `font` is cached.
    pub fn contains(&self, font: &FontDescriptor, text: &str) -> bool {
        self.entries.contains(&(font.css(), text.to_string()))
    }

    /// Measure `text`, consulting the cache first.
    pub fn measure<M: TextMeasurer + ?Sized>(
        &mut self,
        measurer: &mut M,
        text: &str,
        font: &FontDescriptor,
    ) -> TextMetrics {
        let key = (font.css(), text.to_string());
        // `peek` leaves recency untouched so eviction stays insertion-ordered.
        if let Some(metrics) = self.entries.peek(&key) {
            self.hits += 1;
            return *metrics;
        }
        self.misses += 1;
        let metrics = measurer.measure_text(text, font);
        self.entries.put(key, metrics);
        metrics
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clear the cache if `probe` reports usage above `threshold`.
    ///
    /// Returns whether the cache was cleared.
    pub fn relieve_memory_pressure(&mut self, probe: &dyn MemoryProbe, threshold: f64) -> bool {
        let Some(usage) = probe.heap_usage() else {
            return false;
        };
        if !usage.exceeds(threshold) {
            return false;
        }
        tracing::debug!(
            used = usage.used,
            limit = usage.limit,
            dropped = self.entries.len(),
            "memory pressure, clearing text measurements"
        );
        self.clear();
        true
    }
}
