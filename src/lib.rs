//! # Messaggeri - Interruptible Workers Around a Shared Counter
//!
//! A small set of long-lived worker threads, each on its own schedule, that
//! sleep, wake up, increment one counter shared by all of them and report the
//! new value. A sleep can be interrupted from another thread; the worker
//! recovers in place and tries again without touching the counter.
//!
//! ## Components
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │     Orchestrator     │── CompletionLatch::wait()
//!                    └──────────┬───────────┘        ▲
//!                 spawns, one thread per spec        │ guards dropped
//!          ┌────────────────────┼────────────────────┤
//!          ▼                    ▼                    │
//!     ┌──────────┐         ┌──────────┐              │
//!     │ Worker 1 │   ...   │ Worker N │──────────────┘
//!     └────┬─────┘         └────┬─────┘
//!          │ Pause::sleep()     │ ◄── InterruptHandle::interrupt()
//!          ▼                    ▼
//!     ┌──────────────────────────────┐      ┌───────────┐
//!     │  Arc<dyn SharedCounter>      │      │ EventSink │ log / json / tally
//!     └──────────────────────────────┘      └───────────┘
//! ```
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`counters`] | [`SharedCounter`](counters::SharedCounter) and its atomic, sharded and locked implementations |
//! | [`pause`] | The interruptible sleep a worker waits in |
//! | [`latch`] | The cancellable wait-group the orchestrator blocks on |
//! | [`worker`] | Worker state machine and its spec |
//! | [`observers`] | Where worker events go |
//! | [`orchestrator`] | Starts workers, schedules interrupts, joins |
//! | [`config`] | Run configuration and, with `cli`, the argument parser |
//!
//! ## Memory Ordering
//!
//! Unlike a statistics counter, the shared counter here is read back by the
//! thread that just incremented it and reported as a message number, so every
//! implementation increments with `Release` (or stronger) and reads with
//! `Acquire`. An increment on one thread happens-before any read that observes
//! it on another.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use messaggeri::counters::CounterKind;
//! use messaggeri::observers::Tally;
//! use messaggeri::orchestrator::Orchestrator;
//! use messaggeri::worker::WorkerSpec;
//!
//! let tally = Arc::new(Tally::new());
//! let summary = Orchestrator::new(CounterKind::Sharded.build("messages"))
//!     .with_worker(WorkerSpec::millis("Thread-1", 1, 10).unwrap())
//!     .with_worker(WorkerSpec::millis("Thread-2", 2, 10).unwrap())
//!     .with_sink(tally.clone())
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(summary.value, 20);
//! assert_eq!(tally.total_woke(), 20);
//! ```
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `cli` (default) | The `messaggeri` binary and [`config::Cli`]; implies `json` and `table` |
//! | `serde` | `Serialize` for events, reports and summaries |
//! | `json` | [`observers::json`], JSON-lines event output |
//! | `table` | [`observers::table`], summary tables |
//! | `full` | Everything |

pub mod config;
pub mod counters;
pub mod error;
pub mod latch;
pub mod observers;
pub mod orchestrator;
pub mod pause;
pub mod worker;
