//! Scheduling policy: which queued files may start in a pass.
//!
//! The policy works on counts only. The driver collects queued files in
//! queue order and starts the first [`plan_starts`] of them.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Number of files that may start within one batch window.
///
/// Half the parallel limit, rounded up. This is a pacing policy, not a
/// consequence of the limit: a full window budget would let the whole cap
/// start at once and the window would throttle nothing.
#[must_use]
pub fn window_budget(max_parallel_uploads: usize) -> usize {
    max_parallel_uploads.div_ceil(2)
}

/// Number of free parallel slots, bounded by the number of queued files.
///
/// `max_parallel_uploads == 0` means unlimited.
#[must_use]
pub fn free_slots(queued: usize, uploading: usize, max_parallel_uploads: usize) -> usize {
    if max_parallel_uploads == 0 {
        return queued;
    }
    max_parallel_uploads.saturating_sub(uploading).min(queued)
}

/// Rolling micro-batch window limiting how many files start per interval.
///
/// Opening a window resets its counter and spawns a timer; when the timer
/// fires, the callback receives the window's generation so a stale timer
/// can be told apart from the current one.
#[derive(Debug)]
pub struct BatchWindow {
    offset: Duration,
    budget: usize,
    started: usize,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl BatchWindow {
    /// Creates a closed window.
    #[must_use]
    pub fn new(offset: Duration, budget: usize) -> Self {
        Self {
            offset,
            budget,
            started: 0,
            generation: 0,
            timer: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.timer.is_some()
    }

    /// Files started in the current window.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Opens a new window unless one is already open.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open_if_closed(&mut self, on_elapsed: impl FnOnce(u64) + Send + 'static) {
        if self.is_open() {
            return;
        }
        self.started = 0;
        self.generation += 1;
        let generation = self.generation;
        let offset = self.offset;
        debug!(generation, offset_ms = offset.as_millis(), "batch window opened");
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(offset).await;
            on_elapsed(generation);
        }));
    }

    /// Takes up to `wanted` starts from the window budget; returns how many
    /// were granted.
    pub fn admit(&mut self, wanted: usize) -> usize {
        let granted = (self.started + wanted).min(self.budget).saturating_sub(self.started);
        self.started += granted;
        granted
    }

    /// Closes the window if `generation` is current. Returns whether it closed.
    pub fn close(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.timer.is_none() {
            return false;
        }
        self.timer = None;
        self.started = 0;
        debug!(generation, "batch window closed");
        true
    }

    /// Aborts the pending timer, if any.
    pub fn abort(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.started = 0;
    }
}

impl Drop for BatchWindow {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Computes how many queued files may start now.
///
/// Without a window this is the free slot count. With a window, it is
/// further limited by what is left of the window budget, opening a fresh
/// window when none is open and at least one slot is free.
pub fn plan_starts(
    queued: usize,
    uploading: usize,
    max_parallel_uploads: usize,
    window: Option<&mut BatchWindow>,
    on_elapsed: impl FnOnce(u64) + Send + 'static,
) -> usize {
    let count = free_slots(queued, uploading, max_parallel_uploads);
    if count == 0 {
        return 0;
    }
    match window {
        Some(window) => {
            window.open_if_closed(on_elapsed);
            window.admit(count)
        }
        None => count,
    }
}
