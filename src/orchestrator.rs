//! Orchestrator: starts a fixed set of workers and waits for all of them.
//!
//! ```text
//!   Orchestrator::run()
//!     │
//!     ├─ validate names and interrupt plans
//!     ├─ spawn worker threads ─────────► Worker::run()  (one per spec)
//!     ├─ spawn interrupter (optional) ─► sleep, interrupt, sleep, ...
//!     ├─ latch.wait() ◄──────────────── CompletionGuard dropped by each worker
//!     │      └─ cancelled? ──► Err(WaitCancelled), workers keep running
//!     └─ join threads, collect WorkerReports ──► RunSummary
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::counters::SharedCounter;
use crate::error::{ConfigError, OrchestratorError, Result};
use crate::latch::{CancelHandle, CompletionLatch, WaitOutcome};
use crate::observers::{EventSink, LogObserver};
use crate::pause::InterruptHandle;
use crate::worker::{Worker, WorkerReport, WorkerSpec};

/// A diagnostic interrupt: after `after`, interrupt `worker`'s current pause.
///
/// Measured from the moment the interrupter thread starts, right after all
/// workers have been spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptPlan {
    worker: String,
    after: Duration,
}

impl InterruptPlan {
    pub fn new(worker: impl Into<String>, after: Duration) -> Self {
        Self {
            worker: worker.into(),
            after,
        }
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn after(&self) -> Duration {
        self.after
    }
}

impl FromStr for InterruptPlan {
    type Err = ConfigError;

    /// Parses `NAME:AFTER_MS`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some((worker, after)) = s.rsplit_once(':') else {
            return Err(ConfigError::MalformedInterrupt(s.to_string()));
        };
        if worker.trim().is_empty() {
            return Err(ConfigError::MalformedInterrupt(s.to_string()));
        }
        let after_ms = after
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::number(after, e))?;
        Ok(Self::new(worker, Duration::from_millis(after_ms)))
    }
}

impl Display for InterruptPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.worker, self.after.as_millis())
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunSummary {
    /// Name of the shared counter.
    pub counter: String,
    /// Shared counter value after every worker finished.
    pub value: u64,
    /// One report per worker, in configuration order.
    pub workers: Vec<WorkerReport>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Sum of successful iterations across workers.
    pub fn total_sent(&self) -> u64 {
        self.workers.iter().map(|w| w.sent).sum()
    }

    /// Sum of recovered interruptions across workers.
    pub fn total_interruptions(&self) -> u64 {
        self.workers.iter().map(|w| w.interruptions).sum()
    }

    /// Report of the worker called `name`.
    pub fn worker(&self, name: &str) -> Option<&WorkerReport> {
        self.workers.iter().find(|w| w.name == name)
    }
}

/// Runs a fixed set of workers against one shared counter.
///
/// # Examples
///
/// ```rust
/// use messaggeri::counters::CounterKind;
/// use messaggeri::orchestrator::Orchestrator;
/// use messaggeri::worker::WorkerSpec;
///
/// let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
///     .with_worker(WorkerSpec::millis("Thread-1", 1, 10).unwrap())
///     .with_worker(WorkerSpec::millis("Thread-2", 2, 10).unwrap())
///     .run()
///     .unwrap();
///
/// assert_eq!(summary.value, 20);
/// ```
pub struct Orchestrator {
    counter: Arc<dyn SharedCounter>,
    specs: Vec<WorkerSpec>,
    interrupts: Vec<InterruptPlan>,
    sink: Arc<dyn EventSink>,
    join_timeout: Option<Duration>,
    latch: CompletionLatch,
}

impl Orchestrator {
    /// Creates an orchestrator with no workers, reporting through a
    /// [`LogObserver`].
    pub fn new(counter: Arc<dyn SharedCounter>) -> Self {
        Self {
            counter,
            specs: Vec::new(),
            interrupts: Vec::new(),
            sink: Arc::new(LogObserver::new()),
            join_timeout: None,
            latch: CompletionLatch::new(),
        }
    }

    /// Adds a worker.
    pub fn with_worker(mut self, spec: WorkerSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Adds several workers.
    pub fn with_workers(mut self, specs: impl IntoIterator<Item = WorkerSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Schedules a diagnostic interrupt. None are scheduled by default.
    pub fn with_interrupt(mut self, plan: InterruptPlan) -> Self {
        self.interrupts.push(plan);
        self
    }

    /// Replaces the event sink shared by all workers.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Gives up waiting for workers after `timeout`. Waits forever by default.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    /// Returns a handle that cancels [`run`](Self::run)'s wait for workers.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.latch.cancel_handle()
    }

    pub fn counter(&self) -> &Arc<dyn SharedCounter> {
        &self.counter
    }

    pub fn workers(&self) -> &[WorkerSpec] {
        &self.specs
    }

    /// Starts every worker, then blocks until all are done.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::DuplicateWorker`] / [`OrchestratorError::UnknownWorker`]
    ///   before anything is started
    /// - [`OrchestratorError::Spawn`] if a thread cannot be created; workers
    ///   already started keep running
    /// - [`OrchestratorError::WaitCancelled`] if the wait is cancelled through a
    ///   [`CancelHandle`], or [`OrchestratorError::WaitTimedOut`] if the join
    ///   timeout expires; workers keep running in both cases
    /// - [`OrchestratorError::WorkerPanicked`] if a worker thread panicked
    pub fn run(self) -> Result<RunSummary> {
        self.validate()?;

        let started = Instant::now();
        info!(
            workers = self.specs.len(),
            counter = %self.counter.name(),
            "starting workers"
        );

        let mut handles: Vec<(String, JoinHandle<WorkerReport>)> =
            Vec::with_capacity(self.specs.len());
        let mut interrupters: HashMap<String, InterruptHandle> = HashMap::new();

        for spec in &self.specs {
            let worker = Worker::new(spec.clone(), Arc::clone(&self.counter))
                .with_sink(Arc::clone(&self.sink));
            interrupters.insert(spec.name().to_string(), worker.interrupt_handle());

            let guard = self.latch.guard();
            let handle = thread::Builder::new()
                .name(spec.name().to_string())
                .spawn(move || {
                    let _guard = guard;
                    worker.run()
                })
                .map_err(|source| {
                    error!(worker = %spec.name(), "failed to spawn worker: {source}");
                    OrchestratorError::Spawn {
                        name: spec.name().to_string(),
                        source,
                    }
                })?;
            handles.push((spec.name().to_string(), handle));
        }

        if !self.interrupts.is_empty() {
            spawn_interrupter(self.interrupts.clone(), interrupters).map_err(|source| {
                error!("failed to spawn interrupter: {source}");
                OrchestratorError::Spawn {
                    name: INTERRUPTER_THREAD.to_string(),
                    source,
                }
            })?;
        }

        info!("all workers started, waiting for completion");

        let outcome = match self.join_timeout {
            Some(timeout) => self.latch.wait_timeout(timeout),
            None => self.latch.wait(),
        };
        match outcome {
            WaitOutcome::Completed => {}
            WaitOutcome::Cancelled => {
                error!(
                    remaining = self.latch.remaining(),
                    "wait for workers was cancelled"
                );
                return Err(OrchestratorError::WaitCancelled);
            }
            WaitOutcome::TimedOut => {
                error!(
                    remaining = self.latch.remaining(),
                    "workers did not finish in time"
                );
                return Err(OrchestratorError::WaitTimedOut(
                    self.join_timeout.unwrap_or_default(),
                ));
            }
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => {
                    error!(worker = %name, "worker panicked");
                    return Err(OrchestratorError::WorkerPanicked(name));
                }
            }
        }

        let summary = RunSummary {
            counter: self.counter.name().to_string(),
            value: self.counter.read(),
            workers: reports,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            value = summary.value,
            elapsed_ms = summary.elapsed_ms,
            "all workers finished"
        );
        Ok(summary)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.specs.len());
        for spec in &self.specs {
            if !names.insert(spec.name()) {
                return Err(OrchestratorError::DuplicateWorker(spec.name().to_string()));
            }
        }
        for plan in &self.interrupts {
            if !names.contains(plan.worker()) {
                return Err(OrchestratorError::UnknownWorker(plan.worker().to_string()));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("counter", &self.counter)
            .field("specs", &self.specs)
            .field("interrupts", &self.interrupts)
            .field("join_timeout", &self.join_timeout)
            .finish()
    }
}

const INTERRUPTER_THREAD: &str = "interrupter";

/// Fires `plans` in order of their delay on a detached thread.
///
/// Interrupting a worker that already finished is harmless: its pause is
/// never entered again.
fn spawn_interrupter(
    mut plans: Vec<InterruptPlan>,
    handles: HashMap<String, InterruptHandle>,
) -> std::io::Result<JoinHandle<()>> {
    plans.sort_by_key(InterruptPlan::after);
    thread::Builder::new()
        .name(INTERRUPTER_THREAD.to_string())
        .spawn(move || {
            let start = Instant::now();
            for plan in plans {
                if let Some(wait) = plan.after.checked_sub(start.elapsed()) {
                    thread::sleep(wait);
                }
                if let Some(handle) = handles.get(plan.worker()) {
                    info!(worker = %plan.worker(), "interrupting the {} worker", plan.worker());
                    handle.interrupt();
                }
            }
            debug!("interrupter done");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::CounterKind;
    use crate::observers::{Fanout, Tally, WorkerEvent};

    fn spec(name: &str, delay_ms: u64, target: u64) -> WorkerSpec {
        WorkerSpec::millis(name, delay_ms, target).unwrap()
    }

    struct PanicOnWake;

    impl EventSink for PanicOnWake {
        fn record(&self, event: &WorkerEvent<'_>) {
            if let WorkerEvent::Woke { .. } = event {
                panic!("sink failure");
            }
        }
    }

    #[test]
    fn test_two_workers_reach_sum_of_targets() {
        let tally = Arc::new(Tally::new());
        let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("Thread-1", 1, 10))
            .with_worker(spec("Thread-2", 2, 10))
            .with_sink(tally.clone())
            .run()
            .unwrap();

        assert_eq!(summary.value, 20);
        assert_eq!(summary.counter, "messages");
        assert_eq!(summary.total_sent(), 20);
        assert_eq!(summary.total_interruptions(), 0);
        assert_eq!(summary.workers[0].name, "Thread-1");
        assert_eq!(summary.workers[1].name, "Thread-2");

        for name in ["Thread-1", "Thread-2"] {
            let counts = tally.get(name);
            assert_eq!(counts.woke, 10);
            assert_eq!(counts.interrupted, 0);
            assert!(counts.finished);
        }
    }

    #[test]
    fn test_every_counter_kind_sums_targets() {
        for kind in [CounterKind::Atomic, CounterKind::Sharded, CounterKind::Locked] {
            let summary = Orchestrator::new(kind.build("messages"))
                .with_workers((0..8).map(|i| spec(&format!("w{i}"), 1, 25)))
                .with_sink(Arc::new(Tally::new()))
                .run()
                .unwrap();
            assert_eq!(summary.value, 200, "{kind}");
        }
    }

    #[test]
    fn test_scheduled_interrupt_is_recovered() {
        let tally = Arc::new(Tally::new());
        // The interrupt only has to land before the last pause ends: one that
        // arrives between pauses stays pending and cancels the next one.
        let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("target", 100, 5))
            .with_interrupt(InterruptPlan::new("target", Duration::from_millis(50)))
            .with_sink(tally.clone())
            .run()
            .unwrap();

        let report = summary.worker("target").unwrap();
        assert_eq!(report.sent, 5);
        assert_eq!(report.interruptions, 1);
        assert_eq!(summary.value, 5);
        assert_eq!(tally.get("target").woke, 5);
        assert_eq!(tally.get("target").interrupted, 1);
    }

    #[test]
    fn test_zero_target_worker_finishes_immediately() {
        let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("idle", 3_600_000, 0))
            .with_worker(spec("busy", 1, 3))
            .with_sink(Arc::new(Tally::new()))
            .run()
            .unwrap();

        assert_eq!(summary.worker("idle").unwrap().sent, 0);
        assert_eq!(summary.worker("busy").unwrap().sent, 3);
        assert_eq!(summary.value, 3);
    }

    #[test]
    fn test_no_workers() {
        let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .run()
            .unwrap();
        assert_eq!(summary.value, 0);
        assert!(summary.workers.is_empty());
    }

    #[test]
    fn test_cancelled_wait() {
        let orchestrator = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("sleeper", 3_600_000, 1))
            .with_sink(Arc::new(Tally::new()));
        let cancel = orchestrator.cancel_handle();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });

        let err = orchestrator.run().unwrap_err();
        assert!(matches!(err, OrchestratorError::WaitCancelled));
        assert_eq!(err.exit_code(), 2);
        canceller.join().unwrap();
    }

    #[test]
    fn test_join_timeout() {
        let err = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("sleeper", 3_600_000, 1))
            .with_sink(Arc::new(Tally::new()))
            .with_join_timeout(Duration::from_millis(20))
            .run()
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::WaitTimedOut(t) if t == Duration::from_millis(20)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_join_timeout_not_reached() {
        let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("quick", 1, 2))
            .with_sink(Arc::new(Tally::new()))
            .with_join_timeout(Duration::from_secs(60))
            .run()
            .unwrap();
        assert_eq!(summary.value, 2);
    }

    #[test]
    fn test_huge_join_timeout() {
        let summary = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("quick", 1, 2))
            .with_sink(Arc::new(Tally::new()))
            .with_join_timeout(Duration::MAX)
            .run()
            .unwrap();
        assert_eq!(summary.value, 2);
    }

    #[test]
    fn test_huge_delay_times_out_without_panicking() {
        let worker = WorkerSpec::new("w", Duration::MAX, 1).unwrap();
        let err = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(worker)
            .with_sink(Arc::new(Tally::new()))
            .with_join_timeout(Duration::from_millis(50))
            .run()
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::WaitTimedOut(_)));
    }

    #[test]
    fn test_duplicate_worker_rejected() {
        let err = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("w", 1, 1))
            .with_worker(spec("w", 1, 1))
            .run()
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateWorker(ref name) if name == "w"));
    }

    #[test]
    fn test_unknown_interrupt_target_rejected() {
        let counter = CounterKind::Atomic.build("messages");
        let err = Orchestrator::new(counter.clone())
            .with_worker(spec("w", 1, 1))
            .with_interrupt(InterruptPlan::new("ghost", Duration::from_millis(1)))
            .run()
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownWorker(ref name) if name == "ghost"));
        assert_eq!(counter.read(), 0);
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let tally = Arc::new(Tally::new());
        let sink = Fanout::new().with(tally.clone()).with(Arc::new(PanicOnWake));
        let err = Orchestrator::new(CounterKind::Atomic.build("messages"))
            .with_worker(spec("fragile", 1, 3))
            .with_sink(Arc::new(sink))
            .run()
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::WorkerPanicked(ref name) if name == "fragile"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(tally.get("fragile").woke, 1);
    }

    #[test]
    fn test_interrupt_plan_from_str() {
        let plan: InterruptPlan = "Thread-1:5000".parse().unwrap();
        assert_eq!(plan.worker(), "Thread-1");
        assert_eq!(plan.after(), Duration::from_millis(5000));
        assert_eq!(plan.to_string(), "Thread-1:5000");

        assert!(matches!(
            "Thread-1".parse::<InterruptPlan>(),
            Err(ConfigError::MalformedInterrupt(_))
        ));
        assert!(matches!(
            ":10".parse::<InterruptPlan>(),
            Err(ConfigError::MalformedInterrupt(_))
        ));
        assert!(matches!(
            "w:later".parse::<InterruptPlan>(),
            Err(ConfigError::Number { .. })
        ));
    }

    #[test]
    fn test_builder_accessors() {
        let orchestrator = Orchestrator::new(CounterKind::Locked.build("messages"))
            .with_workers([spec("a", 1, 1), spec("b", 1, 1)]);
        assert_eq!(orchestrator.workers().len(), 2);
        assert_eq!(orchestrator.counter().name(), "messages");
        assert!(!orchestrator.cancel_handle().is_cancelled());
    }
}
