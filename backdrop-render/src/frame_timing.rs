//! Compositor timing instrumentation.
//!
//! Emits per-stage durations through `tracing` at trace level when enabled.
//! Only every 60th frame is reported so a 60 fps preview logs about once a
//! second.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static FRAME_COUNT: AtomicU64 = AtomicU64::new(0);

const SAMPLE_EVERY: u64 = 60;

pub fn enable() {
    ENABLED.store(true, Ordering::Relaxed);
}

pub fn disable() {
    ENABLED.store(false, Ordering::Relaxed);
}

#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Bump and return the composite counter.
pub fn next_frame() -> u64 {
    FRAME_COUNT.fetch_add(1, Ordering::Relaxed)
}

/// Read the composite counter without incrementing.
pub fn current_frame() -> u64 {
    FRAME_COUNT.load(Ordering::Relaxed)
}

#[inline]
fn sampled(frame: u64) -> bool {
    is_enabled() && frame % SAMPLE_EVERY == 0
}

/// Run `f` and report how long it took under `label`.
#[inline]
pub fn measure<T>(label: &'static str, frame: u64, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    if sampled(frame) {
        tracing::trace!(frame, stage = label, elapsed = ?start.elapsed(), "composite stage");
    }
    result
}

/// Report a counter value for `frame`.
#[inline]
pub fn stat(label: &'static str, frame: u64, value: impl std::fmt::Display) {
    if sampled(frame) {
        tracing::trace!(frame, stat = label, %value, "composite stat");
    }
}
