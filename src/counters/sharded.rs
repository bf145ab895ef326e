//! Counter with sharded atomic storage.
//!
//! This module provides [`Sharded`], a counter that distributes increments
//! across per-thread slots. Each worker writes its own cache line, so
//! increments never contend; a read pays for it by summing every slot.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use std::fmt::Debug;

use crate::counters::{GetComponentCounter, SharedCounter, NUM_COMPONENTS, THREAD_SLOT_INDEX};

/// A shared counter using sharded atomic storage.
///
/// Instead of a single atomic variable, `Sharded` keeps 64 cache-line-padded
/// slots. Each thread is assigned one slot the first time it touches any
/// sharded counter and only ever increments that slot.
///
/// # Read Consistency
///
/// [`read`](SharedCounter::read) loads each slot with `Acquire` and sums them.
/// Each slot is individually coherent, so two successive reads from the same
/// thread never go backwards, and a thread always sees its own increments.
/// The sum is not a single atomic snapshot across slots: an increment racing
/// with a read may or may not be included in that read.
///
/// # Memory Usage
///
/// Each `Sharded` counter uses approximately 4KB (64 slots × 64 bytes).
///
/// # Examples
///
/// ```rust
/// use messaggeri::counters::sharded::Sharded;
/// use messaggeri::counters::SharedCounter;
/// use std::sync::Arc;
/// use std::thread;
///
/// let counter = Arc::new(Sharded::new());
/// let mut handles = vec![];
///
/// for _ in 0..4 {
///     let c = Arc::clone(&counter);
///     handles.push(thread::spawn(move || {
///         for _ in 0..1000 {
///             c.increment();
///         }
///     }));
/// }
///
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert_eq!(counter.read(), 4000);
/// ```
pub struct Sharded {
    name: &'static str,
    components: [CachePadded<AtomicU64>; NUM_COMPONENTS],
}

impl GetComponentCounter for Sharded {
    type CounterType = AtomicU64;

    /// Returns a reference to the current thread's slot.
    #[inline]
    fn get_component_counter(&self) -> &AtomicU64 {
        THREAD_SLOT_INDEX.with(|idx| &self.components[*idx])
    }
}

impl Sharded {
    /// Creates a new counter initialized to zero.
    ///
    /// All 64 slots are initialized to zero. The counter has no name by default.
    pub const fn new() -> Self {
        const ZERO: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(0));
        Sharded {
            components: [ZERO; NUM_COMPONENTS],
            name: "",
        }
    }

    /// Sets the name of this counter, returning `self` for method chaining.
    pub const fn with_name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    /// Returns the value of the current thread's slot.
    ///
    /// This is the number of increments performed by threads mapped to the
    /// same slot, usually just the calling thread.
    #[inline]
    pub fn local_value(&self) -> u64 {
        self.get_component_counter().load(Ordering::Acquire)
    }

    /// Computes the total value by summing all slots.
    #[inline]
    fn total_value(&self) -> u64 {
        self.components
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .sum()
    }
}

impl SharedCounter for Sharded {
    #[inline]
    fn name(&self) -> &str {
        self.name
    }

    #[inline]
    fn increment(&self) {
        self.get_component_counter().fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the sum of all slots.
    #[inline]
    fn read(&self) -> u64 {
        self.total_value()
    }
}

impl Default for Sharded {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Sharded {
    /// Formats the counter showing non-zero slots.
    ///
    /// Output format: `name{ [slot]:value [slot]:value ... }`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, slot) in self.components.iter().enumerate() {
            let val = slot.load(Ordering::Relaxed);
            if val != 0 {
                write!(f, " [{i}]:{val}")?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new() {
        let counter = Sharded::new();
        assert_eq!(counter.read(), 0);
    }

    #[test]
    fn test_increment() {
        let counter = Sharded::new();
        counter.increment();
        assert_eq!(counter.read(), 1);
        counter.increment();
        counter.increment();
        assert_eq!(counter.read(), 3);
    }

    #[test]
    fn test_local_value() {
        let counter = Sharded::new();
        assert_eq!(counter.local_value(), 0);
        counter.increment();
        assert_eq!(counter.local_value(), 1);
    }

    #[test]
    fn test_debug() {
        let counter = Sharded::new().with_name("messages");
        for _ in 0..5 {
            counter.increment();
        }
        let debug_str = format!("{:?}", counter);
        assert!(debug_str.starts_with("messages{"));
        assert!(debug_str.contains(":5"));
        assert!(debug_str.ends_with("}"));
    }

    #[test]
    fn test_dyn_display() {
        let counter = Sharded::new().with_name("test_counter");
        counter.increment();
        let formatted = format!("{}", &counter as &dyn SharedCounter);
        assert_eq!(formatted, "test_counter:1");
    }

    #[test]
    fn test_multiple_threads_use_distinct_slots() {
        let counter = Arc::new(Sharded::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let counter_clone = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    counter_clone.increment();
                }
                counter_clone.local_value()
            }));
        }

        for handle in handles {
            // A slot may be shared with another thread after wrap-around.
            assert!(handle.join().unwrap() >= 100);
        }

        assert_eq!(counter.read(), 400);
    }

    #[test]
    fn test_with_name() {
        let counter = Sharded::new().with_name("my_counter");
        assert_eq!(counter.name(), "my_counter");
        assert_eq!(Sharded::default().name(), "");
    }
}
