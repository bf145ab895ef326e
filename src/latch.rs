//! A wait-group whose wait can be cancelled.
//!
//! The orchestrator creates a [`CompletionLatch`] and hands one
//! [`CompletionGuard`] to each worker thread. Issuing a guard counts the
//! latch up; dropping it counts the latch down. Drop runs both when the worker
//! returns and when it unwinds from a panic, so a crashing worker can never
//! leave the orchestrator waiting forever.
//!
//! Independently, any thread holding a [`CancelHandle`] can abort the wait.
//! The waiter then gets [`WaitOutcome::Cancelled`] and the guards are left
//! outstanding: cancellation stops the waiting, not the workers.
//!
//! ```text
//!      worker 0 ─ drop(guard) ─┐
//!      worker 1 ─ drop(guard) ─┼─► remaining -= 1, unpark ──►┐
//!      worker N ─ drop(guard) ─┘                             │
//!                                                            ▼
//!   CancelHandle::cancel() ─► cancelled = true, unpark ──► wait()
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_utils::sync::{Parker, Unparker};

/// How [`CompletionLatch::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every guard was dropped.
    Completed,
    /// A [`CancelHandle`] aborted the wait first.
    Cancelled,
    /// The deadline passed with guards still outstanding.
    TimedOut,
}

/// State shared between the waiter, the guards and the cancel handles.
///
/// # Invariants
///
/// - `remaining` equals the number of live guards
/// - `cancelled` is monotonic: once set, never cleared
struct Signal {
    remaining: AtomicUsize,
    cancelled: AtomicBool,
    unparker: Unparker,
}

/// The waiting side of the latch. Owned by the orchestrator's thread.
///
/// Like a wait-group, the latch is only meaningful once every guard has been
/// issued: issue all of them before calling [`wait`](Self::wait).
pub struct CompletionLatch {
    parker: Parker,
    signal: Arc<Signal>,
}

impl CompletionLatch {
    /// Creates a latch with no guards outstanding.
    pub fn new() -> Self {
        let parker = Parker::new();
        let signal = Arc::new(Signal {
            remaining: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            unparker: parker.unparker().clone(),
        });
        Self { parker, signal }
    }

    /// Issues a guard the latch will wait for.
    pub fn guard(&self) -> CompletionGuard {
        self.signal.remaining.fetch_add(1, Ordering::AcqRel);
        CompletionGuard {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Returns a handle that cancels [`wait`](Self::wait).
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Number of guards not yet dropped.
    pub fn remaining(&self) -> usize {
        self.signal.remaining.load(Ordering::Acquire)
    }

    /// Blocks until every guard has been dropped or the wait is cancelled.
    ///
    /// Cancellation wins if both are observed at once.
    pub fn wait(&self) -> WaitOutcome {
        self.wait_until(None)
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// A `timeout` too large to express as an [`Instant`] never expires.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        self.wait_until(Instant::now().checked_add(timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> WaitOutcome {
        loop {
            if self.signal.cancelled.load(Ordering::Acquire) {
                return WaitOutcome::Cancelled;
            }
            if self.signal.remaining.load(Ordering::Acquire) == 0 {
                return WaitOutcome::Completed;
            }
            match deadline {
                None => self.parker.park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    self.parker.park_timeout(deadline - now);
                }
            }
        }
    }
}

impl std::fmt::Debug for CompletionLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionLatch")
            .field("remaining", &self.remaining())
            .field("cancelled", &self.signal.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts a [`CompletionLatch`] down by one when dropped.
pub struct CompletionGuard {
    signal: Arc<Signal>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.signal.remaining.fetch_sub(1, Ordering::AcqRel);
        self.signal.unparker.unpark();
    }
}

impl std::fmt::Debug for CompletionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompletionGuard")
    }
}

/// Aborts a [`CompletionLatch::wait`] from any thread.
#[derive(Clone)]
pub struct CancelHandle {
    signal: Arc<Signal>,
}

impl CancelHandle {
    /// Cancels the wait. Idempotent; never blocks.
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::Release);
        self.signal.unparker.unpark();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_no_guards_completes_immediately() {
        let latch = CompletionLatch::new();
        assert_eq!(latch.wait(), WaitOutcome::Completed);
    }

    #[test]
    fn test_guards_count_up_and_down() {
        let latch = CompletionLatch::new();
        let a = latch.guard();
        let b = latch.guard();
        assert_eq!(latch.remaining(), 2);
        drop(a);
        assert_eq!(latch.remaining(), 1);
        drop(b);
        assert_eq!(latch.remaining(), 0);
        assert_eq!(latch.wait(), WaitOutcome::Completed);
    }

    #[test]
    fn test_completes_when_all_guards_drop() {
        let latch = CompletionLatch::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let guard = latch.guard();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * i));
                    drop(guard);
                })
            })
            .collect();

        assert_eq!(latch.wait(), WaitOutcome::Completed);
        assert_eq!(latch.remaining(), 0);
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_guard_released_on_panic() {
        let latch = CompletionLatch::new();
        let guard = latch.guard();
        let handle = thread::spawn(move || {
            let _guard = guard;
            panic!("worker failure");
        });

        assert_eq!(latch.wait(), WaitOutcome::Completed);
        assert!(handle.join().is_err());
    }

    #[test]
    fn test_cancel_before_wait() {
        let latch = CompletionLatch::new();
        let _outstanding = latch.guard();
        let cancel = latch.cancel_handle();
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert_eq!(latch.wait(), WaitOutcome::Cancelled);
        assert_eq!(latch.remaining(), 1);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let latch = CompletionLatch::new();
        let _outstanding = latch.guard();
        let cancel = latch.cancel_handle();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });

        assert_eq!(latch.wait(), WaitOutcome::Cancelled);
        canceller.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let latch = CompletionLatch::new();
        let _outstanding = latch.guard();
        let start = Instant::now();
        assert_eq!(
            latch.wait_timeout(Duration::from_millis(20)),
            WaitOutcome::TimedOut
        );
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_timeout_unbounded() {
        let latch = CompletionLatch::new();
        let guard = latch.guard();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            drop(guard);
        });
        assert_eq!(latch.wait_timeout(Duration::MAX), WaitOutcome::Completed);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_completes_first() {
        let latch = CompletionLatch::new();
        let guard = latch.guard();
        let handle = thread::spawn(move || drop(guard));
        assert_eq!(
            latch.wait_timeout(Duration::from_secs(60)),
            WaitOutcome::Completed
        );
        handle.join().unwrap();
    }
}
