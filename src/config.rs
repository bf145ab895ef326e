//! Run configuration and the command-line parser that produces it.
//!
//! [`RunConfig`] is always available and is what library users build by hand.
//! [`Cli`] exists only with the `cli` feature and turns command-line arguments
//! into a [`RunConfig`]; worker and interrupt arguments are validated while
//! they are parsed, so a `Cli` that parsed successfully is already valid.

use std::sync::Arc;
use std::time::Duration;

use crate::counters::CounterKind;
use crate::observers::EventSink;
use crate::orchestrator::{InterruptPlan, Orchestrator};
use crate::worker::WorkerSpec;

#[cfg(feature = "cli")]
use crate::observers::table::TableStyle;

/// Name given to the shared counter of a run.
pub const COUNTER_NAME: &str = "messages";

/// The two workers used when none are configured.
pub const DEFAULT_WORKERS: [&str; 2] = ["Thread-1:1000:10", "Thread-2:2000:10"];

/// Everything needed to build an [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub workers: Vec<WorkerSpec>,
    pub interrupts: Vec<InterruptPlan>,
    pub counter: CounterKind,
    /// Give up waiting for workers after this long. `None` waits forever.
    pub join_timeout: Option<Duration>,
}

impl RunConfig {
    /// Creates an empty configuration using the default counter.
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            interrupts: Vec::new(),
            counter: CounterKind::default(),
            join_timeout: None,
        }
    }

    /// Builds an orchestrator over a fresh counter, reporting through `sink`.
    pub fn orchestrator(&self, sink: Arc<dyn EventSink>) -> Orchestrator {
        let mut orchestrator = Orchestrator::new(self.counter.build(COUNTER_NAME))
            .with_workers(self.workers.iter().cloned())
            .with_sink(sink);
        for plan in &self.interrupts {
            orchestrator = orchestrator.with_interrupt(plan.clone());
        }
        if let Some(timeout) = self.join_timeout {
            orchestrator = orchestrator.with_join_timeout(timeout);
        }
        orchestrator
    }
}

impl Default for RunConfig {
    /// Two workers, `Thread-1` every second and `Thread-2` every two seconds,
    /// ten messages each.
    fn default() -> Self {
        let workers = [("Thread-1", 1000), ("Thread-2", 2000)]
            .into_iter()
            .filter_map(|(name, delay_ms)| WorkerSpec::millis(name, delay_ms, 10).ok())
            .collect();
        Self {
            workers,
            ..Self::new()
        }
    }
}

/// Where worker events go.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable log lines
    #[default]
    Log,
    /// One JSON object per event on stdout; logs move to stderr
    Json,
}

/// Runs a fixed set of workers that sleep, then increment a shared counter.
#[cfg(feature = "cli")]
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Worker to start, repeatable
    #[arg(
        short,
        long = "worker",
        value_name = "NAME:DELAY_MS:COUNT",
        default_values = DEFAULT_WORKERS
    )]
    pub workers: Vec<WorkerSpec>,

    /// Interrupt a worker's pause after AFTER_MS, repeatable
    #[arg(short, long = "interrupt", value_name = "NAME:AFTER_MS")]
    pub interrupts: Vec<InterruptPlan>,

    /// Shared counter implementation
    #[arg(short, long, value_enum, default_value = "atomic")]
    pub counter: CounterKind,

    /// Stop waiting for workers after N milliseconds
    #[arg(long, value_name = "N")]
    pub join_timeout_ms: Option<u64>,

    /// Event output format
    #[arg(short, long, value_enum, default_value = "log")]
    pub format: OutputFormat,

    /// Print a per-worker summary table at the end
    #[arg(long)]
    pub summary: bool,

    /// Summary table style
    #[arg(long, value_enum, default_value = "rounded")]
    pub style: TableStyle,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[cfg(feature = "cli")]
impl Cli {
    /// Converts parsed arguments into a run configuration.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            workers: self.workers.clone(),
            interrupts: self.interrupts.clone(),
            counter: self.counter,
            join_timeout: self.join_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::Tally;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.workers[0].to_string(), DEFAULT_WORKERS[0]);
        assert_eq!(config.workers[1].to_string(), DEFAULT_WORKERS[1]);
        assert_eq!(config.counter, CounterKind::Atomic);
        assert!(config.interrupts.is_empty());
        assert!(config.join_timeout.is_none());
    }

    #[test]
    fn test_orchestrator_from_config() {
        let config = RunConfig {
            workers: vec![
                WorkerSpec::millis("a", 1, 3).unwrap(),
                WorkerSpec::millis("b", 1, 4).unwrap(),
            ],
            counter: CounterKind::Sharded,
            join_timeout: Some(Duration::from_secs(60)),
            ..RunConfig::new()
        };
        let orchestrator = config.orchestrator(Arc::new(Tally::new()));
        assert_eq!(orchestrator.workers().len(), 2);
        assert_eq!(orchestrator.counter().name(), COUNTER_NAME);

        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.value, 7);
    }

    #[cfg(feature = "cli")]
    mod cli {
        use super::*;
        use clap::Parser;

        #[test]
        fn test_defaults() {
            let cli = Cli::try_parse_from(["messaggeri"]).unwrap();
            assert_eq!(cli.run_config(), RunConfig::default());
            assert_eq!(cli.format, OutputFormat::Log);
            assert_eq!(cli.style, TableStyle::Rounded);
            assert!(!cli.summary);
        }

        #[test]
        fn test_full_command_line() {
            let cli = Cli::try_parse_from([
                "messaggeri",
                "-w",
                "fast:10:3",
                "--worker",
                "slow:20:2",
                "-i",
                "slow:15",
                "-c",
                "locked",
                "--join-timeout-ms",
                "5000",
                "-f",
                "json",
                "--summary",
                "--style",
                "markdown",
                "-v",
            ])
            .unwrap();

            let config = cli.run_config();
            let names: Vec<&str> = config.workers.iter().map(WorkerSpec::name).collect();
            assert_eq!(names, ["fast", "slow"]);
            assert_eq!(config.interrupts, vec![InterruptPlan::new("slow", Duration::from_millis(15))]);
            assert_eq!(config.counter, CounterKind::Locked);
            assert_eq!(config.join_timeout, Some(Duration::from_millis(5000)));
            assert_eq!(cli.format, OutputFormat::Json);
            assert_eq!(cli.style, TableStyle::Markdown);
            assert!(cli.summary);
            assert!(cli.verbose);
        }

        #[test]
        fn test_invalid_worker_rejected() {
            assert!(Cli::try_parse_from(["messaggeri", "-w", "nocolons"]).is_err());
            assert!(Cli::try_parse_from(["messaggeri", "-w", "w:0:3"]).is_err());
            assert!(Cli::try_parse_from(["messaggeri", "-w", ":10:3"]).is_err());
        }

        #[test]
        fn test_invalid_interrupt_rejected() {
            assert!(Cli::try_parse_from(["messaggeri", "-i", "Thread-1"]).is_err());
        }

        #[test]
        fn test_unknown_counter_rejected() {
            assert!(Cli::try_parse_from(["messaggeri", "-c", "bogus"]).is_err());
        }

        #[test]
        fn test_verbose_conflicts_with_quiet() {
            assert!(Cli::try_parse_from(["messaggeri", "-v", "-q"]).is_err());
        }
    }
}
