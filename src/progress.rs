//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di batch.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking dei conteggi del batch (succeeded, failed, cancelled)
//! - Riga di riepilogo finale per log e CLI
//!
//! ## Componenti principali:
//! - `ProgressManager`: Gestisce la progress bar principale
//! - `BatchStats`: Traccia i conteggi cumulativi di un batch
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 93/150 (62%) ✅ photo.jpg
//! ```

use crate::model::{TaskOutcome, TaskStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for one batch.
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_tasks: u64) -> Self {
        let bar = ProgressBar::new(total_tasks);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Hidden bar for JSON mode, so event lines stay machine-parseable.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics tracker for batch results
#[derive(Debug, Default)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outcome: &TaskOutcome) {
        self.total += 1;
        match outcome.status {
            TaskStatus::Succeeded => self.succeeded += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    /// One-line progress message for a just-completed task.
    pub fn task_message(outcome: &TaskOutcome) -> String {
        match outcome.status {
            TaskStatus::Succeeded => format!("✅ {}", outcome.name),
            TaskStatus::Failed => {
                let reason = outcome.error_message.as_deref().unwrap_or("error");
                format!("❌ {}: {}", outcome.name, reason)
            }
            TaskStatus::Cancelled => format!("⏹ {}: cancelled", outcome.name),
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} tasks | Succeeded: {} | Failed: {} | Cancelled: {}",
            self.total, self.succeeded, self.failed, self.cancelled
        )
    }
}
