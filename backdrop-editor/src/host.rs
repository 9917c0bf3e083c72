//! Tokio-backed frame host.
//!
//! Frame requests resolve on the next tick of a fixed refresh interval and
//! timers after their delay. Both arrive as [`HostEvent`]s on an unbounded
//! channel; the receiver's owner passes them to the scheduler. Cancelling
//! aborts the sleeping task, and a token that already fired is simply not
//! found.

use std::collections::HashMap;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{EditorError, Result};
use crate::scheduler::{Clock, FrameHost, FrameToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Frame(FrameToken),
    Timer(FrameToken),
}

/// Clock on tokio's time source, so it follows a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch: Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

pub struct TokioFrameHost {
    handle: Handle,
    interval: Duration,
    epoch: Instant,
    tx: mpsc::UnboundedSender<HostEvent>,
    tasks: HashMap<FrameToken, JoinHandle<()>>,
}

impl TokioFrameHost {
    /// Create a host on the current tokio runtime.
    pub fn new(interval: Duration) -> Result<(Self, mpsc::UnboundedReceiver<HostEvent>)> {
        let handle = Handle::try_current().map_err(|_| EditorError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            handle,
            interval: interval.max(Duration::from_millis(1)),
            epoch: Instant::now(),
            tx,
            tasks: HashMap::new(),
        };
        Ok((host, rx))
    }

    /// Number of frames/timers not yet delivered or cancelled.
    pub fn outstanding(&mut self) -> usize {
        self.tasks.retain(|_, task| !task.is_finished());
        self.tasks.len()
    }

    /// Time until the next refresh tick.
    fn until_next_tick(&self) -> Duration {
        let interval = self.interval.as_nanos();
        let since = self.epoch.elapsed().as_nanos() % interval;
        Duration::from_nanos((interval - since) as u64)
    }

    fn spawn_after(&mut self, token: FrameToken, delay: Duration, event: HostEvent) {
        let tx = self.tx.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the editor was dropped.
            let _ = tx.send(event);
        });
        self.tasks.retain(|_, task| !task.is_finished());
        self.tasks.insert(token, task);
    }

    fn abort(&mut self, token: FrameToken) {
        if let Some(task) = self.tasks.remove(&token) {
            task.abort();
        }
    }
}

impl FrameHost for TokioFrameHost {
    fn request_frame(&mut self, token: FrameToken) {
        let delay = self.until_next_tick();
        self.spawn_after(token, delay, HostEvent::Frame(token));
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.abort(token);
    }

    fn set_timer(&mut self, token: FrameToken, delay: Duration) {
        self.spawn_after(token, delay, HostEvent::Timer(token));
    }

    fn cancel_timer(&mut self, token: FrameToken) {
        self.abort(token);
    }
}

impl Drop for TokioFrameHost {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
