//! Operator output for the CLI.
//!
//! Two reporters: a plain stderr reporter for the quick admin
//! commands, and a spinner-backed one for dispatch runs. The spinner
//! only draws on a terminal; piped output degrades to plain
//! `[info]`/`[warn]` lines.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use waybill::engine::Reporter;

/// Plain stderr reporter.
pub struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

/// Spinner-backed reporter for dispatch runs.
pub struct DispatchReporter {
    spinner: ProgressBar,
}

impl DispatchReporter {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self { spinner }
    }

    /// Stop drawing before the summary is printed.
    pub fn finish(self) {
        self.spinner.finish_and_clear();
    }

    fn emit(&self, level: &str, msg: &str) {
        if self.spinner.is_hidden() {
            eprintln!("[{level}] {msg}");
        } else {
            self.spinner.println(format!("[{level}] {msg}"));
        }
    }
}

impl Reporter for DispatchReporter {
    fn info(&mut self, msg: &str) {
        self.spinner.set_message(msg.to_string());
        self.emit("info", msg);
    }

    fn warn(&mut self, msg: &str) {
        self.emit("warn", msg);
    }

    fn error(&mut self, msg: &str) {
        self.emit("error", msg);
    }
}
