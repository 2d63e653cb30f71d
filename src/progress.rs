// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for the version poll

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Completed/total contexts of a poll, mirrored into a spinner message
pub struct PollProgress {
    bar: ProgressBar,
    done: AtomicUsize,
    total: usize,
}

impl PollProgress {
    pub fn new(total: usize) -> Self {
        Self::with_bar(create_spinner(&Self::message(0, total)), total)
    }

    /// No terminal output (tests, non-interactive runs)
    pub fn hidden(total: usize) -> Self {
        Self::with_bar(ProgressBar::hidden(), total)
    }

    fn with_bar(bar: ProgressBar, total: usize) -> Self {
        Self {
            bar,
            done: AtomicUsize::new(0),
            total,
        }
    }

    fn message(done: usize, total: usize) -> String {
        format!("Querying API server versions ({}/{})", done, total)
    }

    /// Report one context finished (answered, failed or timed out)
    pub fn context_done(&self, context: &str) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar.set_message(format!(
            "{}, last: {}",
            Self::message(done, self.total),
            context
        ));
    }

    /// Get current progress (done/total)
    #[cfg(test)]
    pub fn progress(&self) -> (usize, usize) {
        (self.done.load(Ordering::SeqCst), self.total)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
