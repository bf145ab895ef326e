//! The per-thread sleep / increment / report loop.
//!
//! # State Machine
//!
//! ```text
//!              target == 0
//!   ┌──────┐ ─────────────────────────────────────────────┐
//!   │ Idle │                                              ▼
//!   └──┬───┘                                          ┌──────┐
//!      │ start                                        │ Done │
//!      ▼                                              └──────┘
//!   ┌─────────┐  pause elapsed   ┌───────────┐  sent == target ▲
//!   │ Waiting │ ───────────────► │ Recording │ ────────────────┘
//!   └─────────┘ ◄─────────────── └───────────┘
//!     │    ▲       sent < target
//!     └────┘
//!   interrupted: log, count nothing, pause again
//! ```
//!
//! # Liveness
//!
//! An interrupted pause is retried with a full `delay`, with no retry cap. A
//! worker that keeps getting interrupted before its pause elapses never
//! advances and never finishes. That is the intended contract: interruptions
//! are recoverable, and giving up after N of them would silently change what
//! "target reached" means. Callers that interrupt in a loop own that risk.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::counters::SharedCounter;
use crate::error::ConfigError;
use crate::observers::{EventSink, LogObserver, WorkerEvent};
use crate::pause::{InterruptHandle, Pause, PauseOutcome};

/// Parameters of a worker, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WorkerSpec {
    name: String,
    delay: Duration,
    target: u64,
}

impl WorkerSpec {
    /// Creates a validated worker spec.
    ///
    /// `name` must be non-empty and free of NUL bytes, and `delay` non-zero.
    /// A `target` of zero is allowed: such a worker finishes without pausing.
    pub fn new(
        name: impl Into<String>,
        delay: Duration,
        target: u64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        // Thread names cannot carry interior NULs.
        if name.contains('\0') {
            return Err(ConfigError::MalformedWorker(name));
        }
        if delay.is_zero() {
            return Err(ConfigError::ZeroDelay(name));
        }
        Ok(Self {
            name,
            delay,
            target,
        })
    }

    /// Shorthand for [`new`](Self::new) with a delay in milliseconds.
    pub fn millis(name: impl Into<String>, delay_ms: u64, target: u64) -> Result<Self, ConfigError> {
        Self::new(name, Duration::from_millis(delay_ms), target)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn target(&self) -> u64 {
        self.target
    }
}

impl FromStr for WorkerSpec {
    type Err = ConfigError;

    /// Parses `NAME:DELAY_MS:COUNT`. The name is everything before the last
    /// two fields, so it may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.rsplitn(3, ':');
        let (Some(count), Some(delay), Some(name)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(ConfigError::MalformedWorker(s.to_string()));
        };

        let delay_ms = delay
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::number(delay, e))?;
        let target = count
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::number(count, e))?;

        Self::millis(name, delay_ms, target)
    }
}

impl Display for WorkerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.delay.as_millis(), self.target)
    }
}

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet started.
    Idle,
    /// Paused for `delay`.
    Waiting,
    /// Incrementing the shared counter and reporting.
    Recording,
    /// Target reached. Terminal.
    Done,
}

/// What a worker did, returned when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WorkerReport {
    pub name: String,
    pub delay_ms: u64,
    pub target: u64,
    /// Successful iterations. Equals `target` for a worker that ran to the end.
    pub sent: u64,
    /// Interrupted pauses that were recovered from.
    pub interruptions: u64,
}

/// A worker bound to a shared counter.
///
/// # Examples
///
/// ```rust
/// use messaggeri::counters::CounterKind;
/// use messaggeri::worker::{Worker, WorkerSpec};
///
/// let counter = CounterKind::Atomic.build("messages");
/// let spec = WorkerSpec::millis("Thread-1", 1, 3).unwrap();
///
/// let report = Worker::new(spec, counter.clone()).run();
/// assert_eq!(report.sent, 3);
/// assert_eq!(counter.read(), 3);
/// ```
pub struct Worker {
    spec: WorkerSpec,
    counter: Arc<dyn SharedCounter>,
    sink: Arc<dyn EventSink>,
    pause: Pause,
    state: WorkerState,
    sent: u64,
    interruptions: u64,
}

impl Worker {
    /// Creates an idle worker that reports through a [`LogObserver`].
    pub fn new(spec: WorkerSpec, counter: Arc<dyn SharedCounter>) -> Self {
        Self {
            spec,
            counter,
            sink: Arc::new(LogObserver::new()),
            pause: Pause::new(),
            state: WorkerState::Idle,
            sent: 0,
            interruptions: 0,
        }
    }

    /// Replaces the event sink, returning `self` for method chaining.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns a handle that interrupts this worker's current or next pause.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.pause.handle()
    }

    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Successful iterations so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Interrupted pauses so far.
    pub fn interruptions(&self) -> u64 {
        self.interruptions
    }

    /// Performs one transition of the state machine and returns the new state.
    ///
    /// From `Idle` or `Recording` the worker either finishes or pauses; a
    /// pause runs to completion (or interruption) inside this call and leaves
    /// the worker in `Recording` or, when interrupted, back in `Waiting`.
    /// Calling `step` on a `Done` worker is a no-op.
    pub fn step(&mut self) -> WorkerState {
        let current = self.state;
        self.state = match current {
            WorkerState::Done => WorkerState::Done,
            WorkerState::Idle | WorkerState::Recording if self.sent >= self.spec.target => {
                self.finish()
            }
            WorkerState::Idle | WorkerState::Recording | WorkerState::Waiting => self.wait(),
        };
        self.state
    }

    /// Runs the worker to completion on the calling thread.
    pub fn run(mut self) -> WorkerReport {
        debug!(worker = %self.spec.name, target = self.spec.target, "worker started");
        while self.step() != WorkerState::Done {}
        self.report()
    }

    /// Snapshot of the worker's progress.
    pub fn report(&self) -> WorkerReport {
        WorkerReport {
            name: self.spec.name.clone(),
            delay_ms: self.spec.delay.as_millis() as u64,
            target: self.spec.target,
            sent: self.sent,
            interruptions: self.interruptions,
        }
    }

    fn wait(&mut self) -> WorkerState {
        self.state = WorkerState::Waiting;
        match self.pause.sleep(self.spec.delay) {
            PauseOutcome::Interrupted => {
                self.interruptions += 1;
                self.sink.record(&WorkerEvent::Interrupted {
                    worker: &self.spec.name,
                    value: self.counter.read(),
                });
                WorkerState::Waiting
            }
            PauseOutcome::Elapsed => {
                self.sent += 1;
                self.counter.increment();
                self.sink.record(&WorkerEvent::Woke {
                    worker: &self.spec.name,
                    sent: self.sent,
                    value: self.counter.read(),
                });
                WorkerState::Recording
            }
        }
    }

    fn finish(&mut self) -> WorkerState {
        self.sink.record(&WorkerEvent::Finished {
            worker: &self.spec.name,
            sent: self.sent,
            interruptions: self.interruptions,
        });
        WorkerState::Done
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .field("sent", &self.sent)
            .field("interruptions", &self.interruptions)
            .finish()
    }
}
