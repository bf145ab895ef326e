//! Counter backed by a single atomic integer.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::counters::SharedCounter;

/// A shared counter stored in one `AtomicU64`.
///
/// This is the default counter of a run. Every increment is a single
/// `fetch_add`, so increments from different workers are serialized by the
/// hardware and can never be lost. With a handful of workers that each sleep
/// between increments, contention on the cache line is negligible.
///
/// # Examples
///
/// ```rust
/// use messaggeri::counters::atomic::Atomic;
/// use messaggeri::counters::SharedCounter;
///
/// let counter = Atomic::new().with_name("messages");
/// counter.increment();
/// counter.increment();
/// assert_eq!(counter.read(), 2);
/// ```
pub struct Atomic {
    name: &'static str,
    value: AtomicU64,
}

impl Atomic {
    /// Creates a new counter initialized to zero with no name.
    pub const fn new() -> Self {
        Atomic {
            name: "",
            value: AtomicU64::new(0),
        }
    }

    /// Sets the name of this counter, returning `self` for method chaining.
    pub const fn with_name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }
}

impl SharedCounter for Atomic {
    #[inline]
    fn name(&self) -> &str {
        self.name
    }

    #[inline]
    fn increment(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    fn read(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

impl Default for Atomic {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Atomic {
    /// Output format: `name{ value }`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{{ {} }}", self.name, self.read())
    }
}
