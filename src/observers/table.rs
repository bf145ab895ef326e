//! Table observer for end-of-run summaries.
//!
//! This module provides [`TableObserver`], which renders a [`RunSummary`] as
//! a formatted table using the `tabled` crate: one row per worker, followed by
//! a total row carrying the shared counter's final value.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! messaggeri = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use messaggeri::observers::table::{TableObserver, TableStyle};
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render(&summary));
//! // ╭──────────┬────────────┬────────┬──────┬─────────────╮
//! // │ Worker   │ Delay (ms) │ Target │ Sent │ Interrupted │
//! // ├──────────┼────────────┼────────┼──────┼─────────────┤
//! // │ Thread-1 │ 1000       │ 10     │ 10   │ 0           │
//! // │ Thread-2 │ 2000       │ 10     │ 10   │ 1           │
//! // │ messages │            │ 20     │ 20   │ 1           │
//! // ╰──────────┴────────────┴────────┴──────┴─────────────╯
//! ```

use tabled::{settings::Style, Table, Tabled};

use crate::orchestrator::RunSummary;

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

/// Internal row representation for tabled.
#[derive(Tabled)]
struct WorkerRow {
    #[tabled(rename = "Worker")]
    name: String,
    #[tabled(rename = "Delay (ms)")]
    delay: String,
    #[tabled(rename = "Target")]
    target: u64,
    #[tabled(rename = "Sent")]
    sent: u64,
    #[tabled(rename = "Interrupted")]
    interrupted: u64,
}

/// Renders run summaries as tables.
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    style: TableStyle,
    show_header: bool,
    title: Option<String>,
}

impl TableObserver {
    /// Creates a table observer with the default style and a header row.
    pub fn new() -> Self {
        Self {
            show_header: true,
            ..Self::default()
        }
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    /// Shows or hides the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.show_header = show;
        self
    }

    /// Sets a title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    /// Renders `summary` as a table string.
    pub fn render(&self, summary: &RunSummary) -> String {
        let mut rows: Vec<WorkerRow> = summary
            .workers
            .iter()
            .map(|w| WorkerRow {
                name: w.name.clone(),
                delay: w.delay_ms.to_string(),
                target: w.target,
                sent: w.sent,
                interrupted: w.interruptions,
            })
            .collect();

        rows.push(WorkerRow {
            name: if summary.counter.is_empty() {
                "(total)".to_string()
            } else {
                summary.counter.clone()
            },
            delay: String::new(),
            target: summary.workers.iter().map(|w| w.target).sum(),
            sent: summary.value,
            interrupted: summary.total_interruptions(),
        });

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        if !self.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }

        if let Some(ref title) = self.title {
            format!("{}\n{}", title, table)
        } else {
            table.to_string()
        }
    }
}
