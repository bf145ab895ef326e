use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use messaggeri::config::{Cli, OutputFormat};
use messaggeri::latch::CancelHandle;
use messaggeri::observers::json::{CounterSnapshot, JsonObserver};
use messaggeri::observers::table::TableObserver;
use messaggeri::observers::{EventSink, LogObserver};

fn setup_logging(verbose: bool, quiet: bool, to_stderr: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false);

    // stdout belongs to the JSON events in json mode
    let result = if to_stderr {
        tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = result {
        eprintln!("failed to set tracing subscriber: {e}");
    }
}

/// Ctrl-C stops waiting for workers; the process then exits with the
/// cancellation status.
fn cancel_on_interrupt(cancel: CancelHandle) -> impl FnMut() + Send + 'static {
    move || {
        warn!("interrupted, no longer waiting for workers");
        cancel.cancel();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.format == OutputFormat::Json;
    setup_logging(cli.verbose, cli.quiet, json_mode);

    let config = cli.run_config();
    let json = Arc::new(JsonObserver::stdout());
    let sink: Arc<dyn EventSink> = match cli.format {
        OutputFormat::Log => Arc::new(LogObserver::new()),
        OutputFormat::Json => json.clone(),
    };

    let workers: Vec<String> = config.workers.iter().map(|w| w.to_string()).collect();
    info!(
        workers = %workers.join(", "),
        counter = %config.counter,
        "messaggeri v{}",
        env!("CARGO_PKG_VERSION")
    );

    let orchestrator = config.orchestrator(sink);
    if let Err(e) = ctrlc::set_handler(cancel_on_interrupt(orchestrator.cancel_handle())) {
        warn!("failed to install Ctrl-C handler: {e}");
    }

    let summary = match orchestrator.run() {
        Ok(summary) => summary,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    if json_mode {
        let snapshot = CounterSnapshot {
            counter: &summary.counter,
            value: summary.value,
        };
        if let Err(e) = json.write_line(&snapshot) {
            error!("failed to write counter snapshot: {e}");
            return ExitCode::FAILURE;
        }
    }

    if cli.summary {
        let table = TableObserver::new()
            .with_style(cli.style)
            .with_title(format!("{} workers, {} ms", summary.workers.len(), summary.elapsed_ms));
        // The table would corrupt a JSON-lines stream on stdout.
        if json_mode {
            eprintln!("{}", table.render(&summary));
        } else {
            println!("{}", table.render(&summary));
        }
    }

    ExitCode::SUCCESS
}
