//! Redraw Scheduler - coalesces redraw requests into bounded-rate frames.
//!
//! ```text
//!            request                frame callback            draw done
//!   Idle ───────────────▶ Pending ─────────────────▶ Drawing ───────────▶ Idle
//!                          ▲   │ request: absorbed      │ request: remembered
//!                          │   ▼                        │
//!                          └── deferral timer ◀─────────┘ (one more cycle)
//! ```
//!
//! The scheduler never draws by itself. It asks a [`FrameHost`] for frame
//! callbacks and timers identified by [`FrameToken`]s, and the host's owner
//! feeds them back through [`RedrawScheduler::on_frame`] and
//! [`RedrawScheduler::on_timer`]. Tokens that are no longer current are
//! ignored, so cancelling something that already fired is harmless.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum gap between the start of two draws (caps the rate near 120 Hz).
pub const DEFAULT_MIN_FRAME_GAP: Duration = Duration::from_millis(8);

/// Identifies one scheduled frame callback or timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed epoch.
    fn now(&self) -> Duration;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.nanos.store(to.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Source of frame callbacks and one-shot timers.
pub trait FrameHost {
    /// Deliver `token` on the next display refresh.
    fn request_frame(&mut self, token: FrameToken);
    fn cancel_frame(&mut self, token: FrameToken);
    /// Deliver `token` after `delay`.
    fn set_timer(&mut self, token: FrameToken, delay: Duration);
    fn cancel_timer(&mut self, token: FrameToken);
}

/// What a [`ManualFrameHost`] has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    RequestFrame(FrameToken),
    CancelFrame(FrameToken),
    SetTimer(FrameToken, Duration),
    CancelTimer(FrameToken),
}

/// Deterministic host: records calls and keeps the live frames and timers
/// for the test to fire.
#[derive(Debug, Default)]
pub struct ManualFrameHost {
    pub calls: Vec<HostCall>,
    frames: VecDeque<FrameToken>,
    timers: Vec<(FrameToken, Duration)>,
}

impl ManualFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest frame callback still pending.
    pub fn next_frame(&self) -> Option<FrameToken> {
        self.frames.front().copied()
    }

    /// Remove and return every pending frame callback.
    pub fn take_frames(&mut self) -> Vec<FrameToken> {
        self.frames.drain(..).collect()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Live timers with their requested delays.
    pub fn timers(&self) -> &[(FrameToken, Duration)] {
        &self.timers
    }

    /// Remove and return every pending timer.
    pub fn take_timers(&mut self) -> Vec<(FrameToken, Duration)> {
        std::mem::take(&mut self.timers)
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&mut self, token: FrameToken) {
        self.calls.push(HostCall::RequestFrame(token));
        self.frames.push_back(token);
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.calls.push(HostCall::CancelFrame(token));
        self.frames.retain(|t| *t != token);
    }

    fn set_timer(&mut self, token: FrameToken, delay: Duration) {
        self.calls.push(HostCall::SetTimer(token, delay));
        self.timers.push((token, delay));
    }

    fn cancel_timer(&mut self, token: FrameToken) {
        self.calls.push(HostCall::CancelTimer(token));
        self.timers.retain(|(t, _)| *t != token);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawState {
    Idle,
    /// A frame callback or deferral timer is outstanding.
    Pending,
    Drawing,
    /// Torn down; nothing will be scheduled or drawn again.
    TornDown,
}

pub struct RedrawScheduler<H, C> {
    host: H,
    clock: C,
    min_gap: Duration,
    state: RedrawState,
    next_token: u64,
    frame: Option<FrameToken>,
    timer: Option<FrameToken>,
    last_draw: Option<Duration>,
    redraw_after_draw: bool,
    draws: u64,
}

impl<H: FrameHost, C: Clock> RedrawScheduler<H, C> {
    pub fn new(host: H, clock: C) -> Self {
        Self::with_min_gap(host, clock, DEFAULT_MIN_FRAME_GAP)
    }

    pub fn with_min_gap(host: H, clock: C, min_gap: Duration) -> Self {
        Self {
            host,
            clock,
            min_gap,
            state: RedrawState::Idle,
            next_token: 1,
            frame: None,
            timer: None,
            last_draw: None,
            redraw_after_draw: false,
            draws: 0,
        }
    }

    pub fn state(&self) -> RedrawState {
        self.state
    }

    /// Number of frames drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Ask for the surface to be redrawn. Safe to call at any rate.
    pub fn request_redraw(&mut self) {
        match self.state {
            RedrawState::Idle => {
                self.state = RedrawState::Pending;
                self.schedule();
            }
            RedrawState::Pending => {
                tracing::trace!("redraw already pending");
            }
            RedrawState::Drawing => {
                self.redraw_after_draw = true;
            }
            RedrawState::TornDown => {
                tracing::trace!("redraw requested after teardown");
            }
        }
    }

    /// Arm a host timer outside the redraw cycle.
    ///
    /// The token comes from the same sequence as frames and deferral timers,
    /// so [`on_timer`](Self::on_timer) never mistakes it for one of its own.
    /// Returns `None` after teardown.
    pub fn arm_timer(&mut self, delay: Duration) -> Option<FrameToken> {
        if self.state == RedrawState::TornDown {
            return None;
        }
        let token = self.token();
        self.host.set_timer(token, delay);
        Some(token)
    }

    pub fn cancel_timer(&mut self, token: FrameToken) {
        self.host.cancel_timer(token);
    }

    /// A deferral timer fired. Stale tokens are ignored.
    pub fn on_timer(&mut self, token: FrameToken) {
        if self.state != RedrawState::Pending || self.timer != Some(token) {
            return;
        }
        self.timer = None;
        self.request_frame();
    }

    /// Enter the Drawing state for a frame callback.
    ///
    /// Returns false, and changes nothing, if `token` is not the current
    /// frame (stale, cancelled or after teardown).
    pub fn begin_frame(&mut self, token: FrameToken) -> bool {
        if self.state != RedrawState::Pending || self.frame != Some(token) {
            tracing::trace!(token = token.0, "ignoring stale frame callback");
            return false;
        }
        self.frame = None;
        self.state = RedrawState::Drawing;
        self.last_draw = Some(self.clock.now());
        true
    }

    /// Leave the Drawing state, starting one more cycle if a redraw was
    /// requested meanwhile.
    pub fn end_frame(&mut self) {
        if self.state != RedrawState::Drawing {
            return;
        }
        self.draws += 1;
        if std::mem::take(&mut self.redraw_after_draw) {
            self.state = RedrawState::Pending;
            self.schedule();
        } else {
            self.state = RedrawState::Idle;
        }
    }

    /// Run `draw` for a frame callback. Returns whether it ran.
    pub fn on_frame(&mut self, token: FrameToken, draw: impl FnOnce()) -> bool {
        if !self.begin_frame(token) {
            return false;
        }
        draw();
        self.end_frame();
        true
    }

    /// Cancel everything outstanding. No draw runs afterwards.
    pub fn teardown(&mut self) {
        self.cancel_outstanding();
        self.redraw_after_draw = false;
        self.state = RedrawState::TornDown;
        tracing::debug!(draws = self.draws, "redraw scheduler torn down");
    }

    /// Schedule the pending draw: straight to a frame, or via a timer when
    /// the last draw was too recent.
    fn schedule(&mut self) {
        self.cancel_outstanding();
        let now = self.clock.now();
        let wait = self
            .last_draw
            .map(|last| self.min_gap.saturating_sub(now.saturating_sub(last)))
            .unwrap_or(Duration::ZERO);
        if wait.is_zero() {
            self.request_frame();
        } else {
            let token = self.token();
            self.timer = Some(token);
            self.host.set_timer(token, wait);
        }
    }

    fn request_frame(&mut self) {
        if let Some(stale) = self.frame.take() {
            self.host.cancel_frame(stale);
        }
        let token = self.token();
        self.frame = Some(token);
        self.host.request_frame(token);
    }

    fn cancel_outstanding(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.host.cancel_frame(frame);
        }
        if let Some(timer) = self.timer.take() {
            self.host.cancel_timer(timer);
        }
    }

    fn token(&mut self) -> FrameToken {
        let token = FrameToken(self.next_token);
        self.next_token += 1;
        token
    }
}
