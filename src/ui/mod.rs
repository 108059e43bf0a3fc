//! Terminal output: progress bar and log formatting

pub mod logging;
mod progress;

pub use progress::{ProgressReporter, ProgressWriter};
