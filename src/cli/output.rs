//! Output helpers for the CLI
//!
//! Command results go to stdout as JSON so they can be piped; human-facing
//! status lines go to stderr, colored unless disabled.

use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{self, Write};

use crate::types::{DirectoryReport, IngestStatus};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✓".green().bold(), message.green());
        } else {
            eprintln!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "•".blue(), message);
        } else {
            eprintln!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            eprintln!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Summarize a directory ingestion on stderr
    pub fn ingest_summary(&self, report: &DirectoryReport) {
        for outcome in &report.outcomes {
            if let IngestStatus::Failed { error } = &outcome.status {
                self.warning(&format!("{}: {}", outcome.source, error));
            }
        }

        let summary = format!(
            "{} indexed ({} chunks), {} failed",
            report.succeeded(),
            report.total_chunks(),
            report.failed()
        );
        if report.failed() == 0 {
            self.success(&summary);
        } else {
            self.warning(&summary);
        }
    }

    /// Write `value` to stdout as pretty-printed JSON
    pub fn json<T: Serialize>(&self, value: &T) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.write_json(&mut stdout, value)
    }

    fn write_json<W: Write, T: Serialize>(&self, out: &mut W, value: &T) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, value)?;
        writeln!(out)?;
        out.flush()
    }
}
