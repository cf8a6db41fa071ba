// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for a diagnosis run
//!
//! The check engine reports which check is running so the CLI can keep a
//! spinner up to date while pods are being probed.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    /// Starting a run of `total` checks
    StartingRun { total: usize },
    /// A check began
    CheckStarted { name: String },
    /// A check finished
    CheckComplete {
        name: String,
        passed: bool,
        elapsed_ms: u64,
    },
}

pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    checks_done: AtomicUsize,
    checks_total: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            sender,
            checks_done: AtomicUsize::new(0),
            checks_total: AtomicUsize::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn start_run(&self, total: usize) {
        self.checks_done.store(0, Ordering::SeqCst);
        self.checks_total.store(total, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::StartingRun { total });
    }

    pub fn check_started(&self, name: &str) {
        let _ = self.sender.send(ProgressUpdate::CheckStarted {
            name: name.to_string(),
        });
    }

    pub fn check_complete(&self, name: &str, passed: bool, elapsed_ms: u64) {
        self.checks_done.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::CheckComplete {
            name: name.to_string(),
            passed,
            elapsed_ms,
        });
    }

    /// Get current progress (done/total)
    pub fn progress(&self) -> (usize, usize) {
        (
            self.checks_done.load(Ordering::SeqCst),
            self.checks_total.load(Ordering::SeqCst),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}
