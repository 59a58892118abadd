//! # Debounce Scheduler
//!
//! Cancellable single-shot timers. Every enqueue re-arms its timer, so a
//! burst of N events in quick succession produces exactly one flush after
//! the burst subsides — a debounce, not a fixed-rate interval.
//!
//! ## Timer Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       DebounceTimer                                     │
//! │                                                                         │
//! │  enqueue ──► arm(delay) ──► cancel pending shot, schedule new one      │
//! │  enqueue ──► arm(delay) ──► (re-arm: previous shot never fires)        │
//! │                  │                                                      │
//! │            delay elapses                                               │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │             callback runs once, timer left DISARMED                     │
//! │             (no idle polling while queues are empty)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Re-arming cancels-and-reschedules rather than mutating a live timer's
//! period: each `arm` aborts the previously spawned task and spawns a fresh
//! one, so a fired or cancelled shot can never observe stale state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

// =============================================================================
// Debounce Timer
// =============================================================================

#[derive(Debug)]
struct TimerInner {
    /// Name used in trace output.
    name: &'static str,

    /// Handle of the pending shot, if armed.
    pending: Mutex<Option<JoinHandle<()>>>,

    /// Generation counter; a fired shot only disarms the slot if its
    /// generation is still current (it may have been re-armed meanwhile).
    generation: AtomicU64,
}

/// A cancellable single-shot timer. Cheap to clone; clones share the slot.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    inner: Arc<TimerInner>,
}

impl DebounceTimer {
    /// Creates a disarmed timer.
    pub fn new(name: &'static str) -> Self {
        DebounceTimer {
            inner: Arc::new(TimerInner {
                name,
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// (Re)schedules the single-shot callback `delay` in the future,
    /// cancelling any previously scheduled but not-yet-fired shot.
    pub fn arm<F, Fut>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        // Bump, spawn, and store under the slot lock: interleaved with a
        // concurrent arm, a stale caller's `replace` could otherwise abort
        // the newer shot while its own task sees a stale generation and
        // never fires.
        let mut slot = match self.inner.pending.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A re-arm issued while we slept owns the next shot.
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }

            // Disarm before running the callback so a re-arm issued from
            // inside the callback is not clobbered afterwards.
            if let Ok(mut slot) = inner.pending.lock() {
                slot.take();
            }
            trace!(timer = inner.name, "Debounce timer fired");

            // Detached: a later re-arm aborts pending shots, never an
            // in-flight flush.
            tokio::spawn(callback());
        });

        if let Some(previous) = slot.replace(handle) {
            previous.abort();
            trace!(timer = self.inner.name, "Debounce timer re-armed");
        }
    }

    /// Cancels any pending shot and leaves the timer disarmed.
    pub fn disarm(&self) {
        let mut slot = match self.inner.pending.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = slot.take() {
            handle.abort();
            trace!(timer = self.inner.name, "Debounce timer disarmed");
        }
    }

    /// Whether a shot is currently scheduled.
    pub fn is_armed(&self) -> bool {
        match self.inner.pending.lock() {
            Ok(slot) => slot.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
