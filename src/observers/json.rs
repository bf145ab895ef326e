//! JSON-lines observer for worker events.
//!
//! This module provides [`JsonObserver`], which writes every [`WorkerEvent`]
//! as one JSON object per line, tagged by an `"event"` field.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! messaggeri = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use messaggeri::observers::json::JsonObserver;
//! use messaggeri::observers::{EventSink, WorkerEvent};
//!
//! let observer = JsonObserver::new(Vec::new());
//! observer.record(&WorkerEvent::Woke { worker: "Thread-1", sent: 1, value: 1 });
//!
//! let out = String::from_utf8(observer.into_inner()).unwrap();
//! // {"event":"woke","worker":"Thread-1","sent":1,"value":1}
//! ```

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::error;

use crate::observers::{EventSink, WorkerEvent};

/// A snapshot of the shared counter, written at the end of a run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CounterSnapshot<'a> {
    /// The name of the counter.
    pub counter: &'a str,
    /// The final counter value.
    pub value: u64,
}

/// Writes worker events as JSON lines to any [`Write`] target.
///
/// Writes from concurrent workers are serialized by an internal mutex, so
/// lines never interleave. A failed write cannot be propagated back into the
/// worker loop; it is logged and the event is dropped.
#[derive(Debug)]
pub struct JsonObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonObserver<io::Stdout> {
    /// Creates an observer writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonObserver<W> {
    /// Creates an observer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Serializes any value as a single line.
    pub fn write_line<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *out, value)?;
        out.write_all(b"\n").map_err(serde_json::Error::io)?;
        out.flush().map_err(serde_json::Error::io)
    }

    /// Consumes the observer and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for JsonObserver<W> {
    fn record(&self, event: &WorkerEvent<'_>) {
        if let Err(e) = self.write_line(event) {
            error!(worker = event.worker(), "failed to write event: {e}");
        }
    }
}
