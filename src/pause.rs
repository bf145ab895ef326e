//! Interruptible pauses.
//!
//! A worker spends almost all of its life inside [`Pause::sleep`]. Another
//! thread holding the matching [`InterruptHandle`] can cut that sleep short;
//! the worker then sees [`PauseOutcome::Interrupted`] instead of
//! [`PauseOutcome::Elapsed`] and decides how to recover.
//!
//! # Design
//!
//! ```text
//!   InterruptHandle::interrupt()          Pause::sleep(d)
//!   ────────────────────────────          ──────────────────────────────
//!   pending.store(true, Release)          loop {
//!   unparker.unpark()  ──────────────►      if pending.swap(false) → Interrupted
//!                                           if now >= deadline     → Elapsed
//!                                           parker.park_timeout(deadline - now)
//!                                         }
//! ```
//!
//! - **No lost interrupts**: the flag is set before the unpark, and the parker
//!   keeps an unpark token, so an interrupt that lands between the flag check
//!   and `park_timeout` still wakes the sleeper.
//! - **Sticky**: an interrupt requested while nobody is sleeping cancels the
//!   next sleep immediately.
//! - **Consumed once**: observing an interrupt clears it.
//! - **Spurious wakeups** are absorbed by the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_utils::sync::{Parker, Unparker};

/// How a call to [`Pause::sleep`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// The full duration elapsed.
    Elapsed,
    /// An interrupt was observed before the duration elapsed.
    Interrupted,
}

/// The sleeping side of an interruptible pause.
///
/// Owned by exactly one thread; hand out [`InterruptHandle`]s to the threads
/// that may interrupt it.
pub struct Pause {
    parker: Parker,
    pending: Arc<AtomicBool>,
}

impl Pause {
    /// Creates a pause with no interrupt pending.
    pub fn new() -> Self {
        Self {
            parker: Parker::new(),
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle that interrupts this pause.
    pub fn handle(&self) -> InterruptHandle {
        InterruptHandle {
            pending: Arc::clone(&self.pending),
            unparker: self.parker.unparker().clone(),
        }
    }

    /// Blocks the current thread for `duration`, or until interrupted.
    ///
    /// A `duration` too large to express as an [`Instant`] sleeps until
    /// interrupted.
    pub fn sleep(&self, duration: Duration) -> PauseOutcome {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.pending.swap(false, Ordering::AcqRel) {
                return PauseOutcome::Interrupted;
            }
            match deadline {
                None => self.parker.park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return PauseOutcome::Elapsed;
                    }
                    self.parker.park_timeout(deadline - now);
                }
            }
        }
    }

    /// Returns `true` if an interrupt is waiting to be observed.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for Pause {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pause")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Interrupts a [`Pause`] from any thread.
#[derive(Clone)]
pub struct InterruptHandle {
    pending: Arc<AtomicBool>,
    unparker: Unparker,
}

impl InterruptHandle {
    /// Requests that the current (or next) sleep end early.
    ///
    /// Never blocks. Several interrupts delivered before the sleeper observes
    /// them collapse into one.
    pub fn interrupt(&self) {
        self.pending.store(true, Ordering::Release);
        self.unparker.unpark();
    }
}

impl std::fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish()
    }
}
