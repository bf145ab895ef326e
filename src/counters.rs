//! Shared counters and the infrastructure they are built on.
//!
//! Every worker in a run holds an `Arc<dyn SharedCounter>` pointing at the same
//! register. The trait is the only way workers touch it, so the synchronization
//! primitive underneath can be swapped without changing any worker logic.
//!
//! # Available Counter Types
//!
//! | Type | Storage | Read cost |
//! |------|---------|-----------|
//! | [`Atomic`](atomic::Atomic) | Single `AtomicU64` | One load |
//! | [`Sharded`](sharded::Sharded) | 64 cache-padded slots, one per thread | Sum of 64 loads |
//! | [`Locked`](locked::Locked) | `Mutex<u64>` | Lock + load |
//!
//! # Memory Ordering
//!
//! Unlike plain statistics counters, a worker logs the value it observes right
//! after its own increment, and other workers must see that increment on their
//! next read. All implementations therefore publish increments with `Release`
//! and read them with `Acquire`.
//!
//! # Thread Slot Assignment
//!
//! The [`Sharded`](sharded::Sharded) counter assigns each thread a slot the
//! first time it touches any counter:
//!
//! ```text
//!                          ┌─────────────────────────────────────┐
//!                          │          Sharded counter            │
//!                          ├─────────────────────────────────────┤
//!   Worker 0 ──writes──►   │ [Slot 0] ████████ (CachePadded)     │
//!   Worker 1 ──writes──►   │ [Slot 1] ████████ (CachePadded)     │
//!        ...               │    ...                              │
//!   Worker 63 ─writes──►   │ [Slot 63] ███████ (CachePadded)     │
//!                          └─────────────────────────────────────┘
//!                                          │
//!                                          ▼
//!                                    read() sums
//!                                     all slots
//! ```
//!
//! Slots are handed out round-robin; after 64 threads, assignment wraps and
//! threads share slots. Sharing only costs contention, never correctness,
//! because every slot update is an atomic read-modify-write.

pub mod atomic;
pub mod locked;
pub mod sharded;

use atomic_traits::Atomic as AtomicInteger;
use std::{
    fmt::{Debug, Display},
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::error::ConfigError;

/// Number of slots used by a [`Sharded`](sharded::Sharded) counter.
///
/// A power of two, so the modulo in [`get_next_slot_id`] is a mask. Each slot
/// is cache-line padded, giving `64 × 64 = 4KB` per counter.
pub(crate) const NUM_COMPONENTS: usize = 64;

/// Global counter for assigning slot IDs to threads.
static NEXT_SLOT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Slot index of the current thread, assigned lazily and stable for the
    /// lifetime of the thread.
    pub(crate) static THREAD_SLOT_INDEX: usize = get_next_slot_id();
}

/// Assigns the next slot ID to a thread, in `[0, NUM_COMPONENTS)`.
///
/// `Relaxed` is enough: only atomicity of the fetch matters here, the slot
/// value itself is never used to order other memory operations.
pub(crate) fn get_next_slot_id() -> usize {
    NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed) % NUM_COMPONENTS
}

/// A mutation-safe integer register shared by every worker of a run.
///
/// # Contract
///
/// - [`increment`](SharedCounter::increment) adds exactly one. Concurrent
///   increments are never lost.
/// - [`read`](SharedCounter::read) may run concurrently with increments and
///   never observes a torn value.
/// - An increment happens-before any `read` on another thread that observes it,
///   and a thread always observes its own completed increments.
/// - The value never decreases; nothing in the crate resets it.
///
/// # Examples
///
/// ```rust
/// use messaggeri::counters::atomic::Atomic;
/// use messaggeri::counters::SharedCounter;
/// use std::sync::Arc;
/// use std::thread;
///
/// let counter: Arc<dyn SharedCounter> = Arc::new(Atomic::new().with_name("messages"));
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let c = Arc::clone(&counter);
///         thread::spawn(move || c.increment())
///     })
///     .collect();
/// for h in handles {
///     h.join().unwrap();
/// }
///
/// assert_eq!(counter.read(), 4);
/// assert_eq!(counter.to_string(), "messages:4");
/// ```
pub trait SharedCounter: Debug + Send + Sync {
    /// Returns the name of this counter, or an empty string if none was set.
    fn name(&self) -> &str;

    /// Atomically adds one to the counter.
    fn increment(&self);

    /// Returns the current value of the counter.
    fn read(&self) -> u64;
}

impl Display for dyn SharedCounter + '_ {
    /// Formats the counter as `name:value` if named, or just `value` otherwise.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.name().is_empty() {
            write!(f, "{}:{}", self.name(), self.read())
        } else {
            write!(f, "{}", self.read())
        }
    }
}

/// Internal trait for accessing the current thread's slot of a sharded counter.
pub(crate) trait GetComponentCounter {
    /// The atomic type used for individual slots.
    type CounterType: AtomicInteger;

    /// Returns a reference to the current thread's slot, selected through
    /// `THREAD_SLOT_INDEX`.
    fn get_component_counter(&self) -> &Self::CounterType;
}

/// Selects which [`SharedCounter`] implementation backs a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum CounterKind {
    /// A single `AtomicU64`.
    #[default]
    Atomic,
    /// Per-thread cache-padded slots summed on read.
    Sharded,
    /// A mutex-guarded integer.
    Locked,
}

impl CounterKind {
    /// Returns the lowercase name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Atomic => "atomic",
            CounterKind::Sharded => "sharded",
            CounterKind::Locked => "locked",
        }
    }

    /// Builds a fresh, zeroed counter of this kind.
    pub fn build(self, name: &'static str) -> Arc<dyn SharedCounter> {
        match self {
            CounterKind::Atomic => Arc::new(atomic::Atomic::new().with_name(name)),
            CounterKind::Sharded => Arc::new(sharded::Sharded::new().with_name(name)),
            CounterKind::Locked => Arc::new(locked::Locked::new().with_name(name)),
        }
    }
}

impl Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(CounterKind::Atomic),
            "sharded" => Ok(CounterKind::Sharded),
            "locked" => Ok(CounterKind::Locked),
            other => Err(ConfigError::UnknownCounter(other.to_string())),
        }
    }
}
