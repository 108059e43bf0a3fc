//! Progress reporting

use crate::types::SyncStage;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::MakeWriter;

/// Progress bar over the modules of a sync run
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    started_at: Instant,
}

impl ProgressReporter {
    /// Create a progress reporter drawing to stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} {bar:30.cyan/blue} {pos}/{len} modules | {msg}")
        {
            bar.set_style(style.progress_chars("=>-").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        Self::with_bar(bar)
    }

    /// Reporter that draws nothing (json logs, tests)
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            started_at: Instant::now(),
        }
    }

    /// Initialize progress for `modules` modules.
    pub fn start(&mut self, modules: u64) {
        self.started_at = Instant::now();
        self.bar.set_length(modules);
        self.bar.set_position(0);
        self.bar.set_message("starting...".to_string());
        if modules > 0 {
            self.bar.enable_steady_tick(Duration::from_millis(120));
        }
    }

    /// Show which stage a module just entered.
    pub fn set_stage(&self, module: &str, stage: SyncStage) {
        self.bar.set_message(format!("{}: {}", module, stage));
    }

    /// Advance past one finished module.
    pub fn finish_module(&self, module: &str, success: bool) {
        self.bar.inc(1);
        if !success {
            self.bar.set_message(format!("{}: failed", module));
        }
    }

    /// Finalize the bar.
    pub fn finish(&self, succeeded: usize, failed: usize) {
        self.bar.finish_with_message(format!(
            "{} synced, {} failed in {:.1}s",
            succeeded,
            failed,
            self.started_at.elapsed().as_secs_f64()
        ));
    }

    /// A log sink that hides the bar while each line is written
    pub fn writer(&self) -> ProgressWriter {
        ProgressWriter {
            bar: self.bar.clone(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// stderr writer that keeps log lines from tearing the progress bar
#[derive(Clone)]
pub struct ProgressWriter {
    bar: ProgressBar,
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.bar.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for ProgressWriter {
    type Writer = ProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
