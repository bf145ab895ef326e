//! Observers for worker events.
//!
//! Workers never print directly. Each state change that matters to the
//! outside world is reported as a [`WorkerEvent`] to an [`EventSink`]:
//!
//! - [`LogObserver`] - emits the events through `tracing` (the default)
//! - [`Tally`] - counts events per worker in memory
//! - [`Fanout`] - forwards every event to several sinks
//! - [`json`] - writes one JSON object per event (feature `json`)
//! - [`table`] - renders the end-of-run summary as a table (feature `table`)
//!
//! Sinks are called from worker threads, concurrently, so they must be
//! `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use messaggeri::observers::{EventSink, Fanout, LogObserver, Tally, WorkerEvent};
//! use std::sync::Arc;
//!
//! let tally = Arc::new(Tally::new());
//! let sink = Fanout::new()
//!     .with(Arc::new(LogObserver::new()))
//!     .with(tally.clone());
//!
//! sink.record(&WorkerEvent::Woke { worker: "Thread-1", sent: 1, value: 1 });
//! assert_eq!(tally.get("Thread-1").woke, 1);
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "table")]
pub mod table;

/// Something a worker did that observers care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum WorkerEvent<'a> {
    /// A pause completed and the shared counter was incremented.
    Woke {
        worker: &'a str,
        /// Successful iterations of this worker so far, this one included.
        sent: u64,
        /// Shared counter value read right after the increment.
        value: u64,
    },
    /// A pause was interrupted; nothing was counted.
    Interrupted {
        worker: &'a str,
        /// Shared counter value at the time of the interruption.
        value: u64,
    },
    /// The worker reached its target and is exiting.
    Finished {
        worker: &'a str,
        sent: u64,
        interruptions: u64,
    },
}

impl WorkerEvent<'_> {
    /// Name of the worker that produced this event.
    pub fn worker(&self) -> &str {
        match self {
            WorkerEvent::Woke { worker, .. }
            | WorkerEvent::Interrupted { worker, .. }
            | WorkerEvent::Finished { worker, .. } => worker,
        }
    }
}

impl Display for WorkerEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerEvent::Woke { worker, value, .. } => {
                write!(f, "{worker} has woken up and this is message number {value}")
            }
            WorkerEvent::Interrupted { worker, value } => write!(
                f,
                "{worker} was interrupted at message number {value}. \
                 Recovering and continuing; not incrementing counter."
            ),
            WorkerEvent::Finished {
                worker,
                sent,
                interruptions,
            } => write!(
                f,
                "{worker} finished after {sent} messages ({interruptions} interrupted)"
            ),
        }
    }
}

/// Receives [`WorkerEvent`]s from worker threads.
pub trait EventSink: Send + Sync {
    /// Records one event. Must not block for long: the calling worker is
    /// between its increment and its next pause.
    fn record(&self, event: &WorkerEvent<'_>);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn record(&self, event: &WorkerEvent<'_>) {
        (**self).record(event)
    }
}

/// Emits events through `tracing`.
///
/// Wakes are logged at `INFO`, interruptions at `WARN` so they stand out from
/// successful wakes, and completions at `DEBUG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl LogObserver {
    /// Creates a new log observer.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogObserver {
    fn record(&self, event: &WorkerEvent<'_>) {
        match *event {
            WorkerEvent::Woke { worker, sent, value } => {
                info!(worker, sent, value, "{event}");
            }
            WorkerEvent::Interrupted { worker, value } => {
                warn!(worker, value, "{event}");
            }
            WorkerEvent::Finished { worker, .. } => {
                debug!(worker, "{event}");
            }
        }
    }
}

/// Per-worker event counts collected by a [`Tally`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub woke: u64,
    pub interrupted: u64,
    pub finished: bool,
    /// Counter value carried by the most recent event.
    pub last_value: u64,
}

/// Counts events per worker.
#[derive(Debug, Default)]
pub struct Tally {
    counts: Mutex<HashMap<String, EventCounts>>,
}

impl Tally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EventCounts>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the counts for `worker`, all zero if it never reported.
    pub fn get(&self, worker: &str) -> EventCounts {
        self.lock().get(worker).copied().unwrap_or_default()
    }

    /// Total wake events across all workers.
    pub fn total_woke(&self) -> u64 {
        self.lock().values().map(|c| c.woke).sum()
    }

    /// Total interruption events across all workers.
    pub fn total_interrupted(&self) -> u64 {
        self.lock().values().map(|c| c.interrupted).sum()
    }
}

impl EventSink for Tally {
    fn record(&self, event: &WorkerEvent<'_>) {
        let mut counts = self.lock();
        let entry = counts.entry(event.worker().to_string()).or_default();
        match *event {
            WorkerEvent::Woke { value, .. } => {
                entry.woke += 1;
                entry.last_value = value;
            }
            WorkerEvent::Interrupted { value, .. } => {
                entry.interrupted += 1;
                entry.last_value = value;
            }
            WorkerEvent::Finished { .. } => entry.finished = true,
        }
    }
}

/// Forwards each event to every registered sink, in registration order.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Fanout {
    /// Creates a fan-out with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink, returning `self` for method chaining.
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns `true` if no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Fanout {
    fn record(&self, event: &WorkerEvent<'_>) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout").field("sinks", &self.sinks.len()).finish()
    }
}
