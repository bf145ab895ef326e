//! Counter backed by a mutex-guarded integer.

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::counters::SharedCounter;

/// A shared counter whose value lives behind a [`Mutex`].
///
/// Increments and reads each take the lock, so they are trivially serialized.
/// The critical section is a single addition that cannot panic, so a poisoned
/// lock still guards a consistent value and poisoning is ignored.
///
/// # Examples
///
/// ```rust
/// use messaggeri::counters::locked::Locked;
/// use messaggeri::counters::SharedCounter;
///
/// let counter = Locked::new().with_name("messages");
/// counter.increment();
/// assert_eq!(counter.read(), 1);
/// ```
pub struct Locked {
    name: &'static str,
    value: Mutex<u64>,
}

impl Locked {
    /// Creates a new counter initialized to zero with no name.
    pub const fn new() -> Self {
        Locked {
            name: "",
            value: Mutex::new(0),
        }
    }

    /// Sets the name of this counter, returning `self` for method chaining.
    pub fn with_name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SharedCounter for Locked {
    #[inline]
    fn name(&self) -> &str {
        self.name
    }

    #[inline]
    fn increment(&self) {
        *self.lock() += 1;
    }

    #[inline]
    fn read(&self) -> u64 {
        *self.lock()
    }
}

impl Default for Locked {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Locked {
    /// Output format: `name{ value }`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{{ {} }}", self.name, self.read())
    }
}
