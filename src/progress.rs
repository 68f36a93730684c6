//! Progress reporting for the remote walker
//!
//! Provides a live spinner using indicatif and the end-of-run summary.

use crate::walker::{ProgressSink, TraversalProgress};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing running match/denied/directory counts
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let spinner = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: TraversalProgress) {
        self.bar.set_message(format_progress(&progress));
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn on_progress(&self, progress: TraversalProgress) {
        self.update(progress);
    }
}

fn format_progress(progress: &TraversalProgress) -> String {
    format!(
        "Dirs: {} | Matches: {} | Denied: {}",
        format_number(progress.dirs_listed),
        format_number(progress.matched as u64),
        format_number(progress.denied as u64),
    )
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Figures shown in the end-of-run summary
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub title: &'static str,
    pub dirs: u64,
    pub matches: usize,
    pub denied: usize,
    pub bytes: u64,
    pub duration: Duration,
    pub completed: bool,
    pub download_dir: Option<String>,
}

/// Print a summary of the run
pub fn print_summary(summary: &Summary) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.dirs as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if summary.completed {
        println!("{}", style(summary.title).green().bold());
    } else {
        println!("{} {}", style(summary.title).yellow().bold(), style("(cancelled)").yellow());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Directories:").bold(), format_number(summary.dirs));
    println!("  {} {}", style("Matches:").bold(), format_number(summary.matches as u64));
    println!("  {} {}", style("Total Size:").bold(), format_size(summary.bytes, BINARY));
    println!(
        "  {} {:.1}s ({:.0} dirs/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if summary.denied > 0 {
        println!(
            "  {} {}",
            style("Denied:").yellow().bold(),
            format_number(summary.denied as u64)
        );
    }
    if let Some(dir) = &summary.download_dir {
        println!("  {} {}", style("Downloaded to:").bold(), dir);
    }
    println!();
}

/// Print a header at the start of the run
pub fn print_header(target: &str, root: &str, pattern: &str, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("sftp-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Target:").bold(), target);
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Pattern:").bold(), pattern);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_progress() {
        let progress = TraversalProgress {
            matched: 1500,
            denied: 2,
            dirs_listed: 12,
        };
        assert_eq!(
            format_progress(&progress),
            "Dirs: 12 | Matches: 1,500 | Denied: 2"
        );
    }
}
