//! # Result Reporter Module
//!
//! Questo modulo accumula gli outcome per-task e assembla il `BatchReport`.
//!
//! ## Responsabilità:
//! - Uno slot per task sottomesso, indicizzato per posizione di submission
//! - Accetta outcome in qualsiasi ordine di completamento e presenta il
//!   report sempre in ordine di submission
//! - Conta succeeded/failed/cancelled e raggruppa i fallimenti per
//!   classificazione
//!
//! ## Contratto:
//! - Ogni task riporta esattamente un outcome terminale; registrare due
//!   volte lo stesso indice è una violazione di contratto (assert)
//! - `finalize` consuma il builder: finalizzare due volte non è
//!   rappresentabile nel type system
//!
//! ## Macchina a stati per task:
//! `Queued -> Running -> {Succeeded, Failed}`; i task rigettati in
//! validazione passano direttamente a `Failed`, quelli mai reclamati dopo
//! una cancellazione a `Cancelled`. Gli stati terminali sono finali.

use crate::model::{BatchReport, ErrorKind, TaskOutcome, TaskStatus};
use std::collections::BTreeMap;

/// Accumulates one terminal outcome per submitted task.
#[derive(Debug)]
pub struct ReportBuilder {
    slots: Vec<Option<TaskOutcome>>,
}

impl ReportBuilder {
    /// Create a builder for a batch of `total` submitted tasks.
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
        }
    }

    /// Record the terminal outcome of the task at `index`.
    ///
    /// Recording the same index twice violates the one-outcome-per-task
    /// contract and asserts.
    pub fn record(&mut self, index: usize, outcome: TaskOutcome) {
        assert!(
            self.slots[index].is_none(),
            "task {} already has a terminal outcome",
            index
        );
        self.slots[index] = Some(outcome);
    }

    /// Number of tasks with a terminal outcome so far.
    pub fn recorded(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Assemble the final report.
    ///
    /// Consumes the builder, so a second finalization cannot be expressed.
    /// Asserts that every submitted task reported exactly once.
    pub fn finalize(self) -> BatchReport {
        let total = self.slots.len();
        let outcomes: Vec<TaskOutcome> = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| panic!("task {} never reported an outcome", index))
            })
            .collect();

        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        let mut failed_by_kind: BTreeMap<ErrorKind, usize> = BTreeMap::new();

        for outcome in &outcomes {
            match outcome.status {
                TaskStatus::Succeeded => succeeded += 1,
                TaskStatus::Failed => {
                    failed += 1;
                    let kind = outcome.error_kind.unwrap_or(ErrorKind::Internal);
                    *failed_by_kind.entry(kind).or_insert(0) += 1;
                }
                TaskStatus::Cancelled => cancelled += 1,
            }
        }

        BatchReport {
            total,
            succeeded,
            failed,
            cancelled,
            failed_by_kind,
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn succeeded(name: &str) -> TaskOutcome {
        TaskOutcome::succeeded(
            name.to_string(),
            PathBuf::from(format!("/in/{}", name)),
            PathBuf::from(format!("/out/{}", name)),
            None,
        )
    }

    fn failed(name: &str, kind: ErrorKind) -> TaskOutcome {
        TaskOutcome::failed(
            name.to_string(),
            PathBuf::from(format!("/in/{}", name)),
            kind,
            "boom".to_string(),
            None,
        )
    }

    #[test]
    fn test_counts_add_up() {
        let mut builder = ReportBuilder::new(4);
        builder.record(0, succeeded("a.png"));
        builder.record(1, failed("b.png", ErrorKind::SourceMissing));
        builder.record(2, succeeded("c.png"));
        builder.record(
            3,
            TaskOutcome::cancelled("d.png".to_string(), PathBuf::from("/in/d.png")),
        );

        let report = builder.finalize();
        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded + report.failed + report.cancelled, report.total);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 1);
    }

    #[test]
    fn test_outcomes_in_submission_order_regardless_of_completion() {
        let mut builder = ReportBuilder::new(3);
        // Completion order: 2, 0, 1
        builder.record(2, succeeded("c.png"));
        builder.record(0, succeeded("a.png"));
        builder.record(1, succeeded("b.png"));

        let report = builder.finalize();
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_failures_grouped_by_kind() {
        let mut builder = ReportBuilder::new(3);
        builder.record(0, failed("a.png", ErrorKind::Decode));
        builder.record(1, failed("b.png", ErrorKind::Decode));
        builder.record(2, failed("c.png", ErrorKind::Write));

        let report = builder.finalize();
        assert_eq!(report.failed_by_kind[&ErrorKind::Decode], 2);
        assert_eq!(report.failed_by_kind[&ErrorKind::Write], 1);
    }

    #[test]
    #[should_panic(expected = "already has a terminal outcome")]
    fn test_double_record_is_a_contract_violation() {
        let mut builder = ReportBuilder::new(1);
        builder.record(0, succeeded("a.png"));
        builder.record(0, succeeded("a.png"));
    }

    #[test]
    #[should_panic(expected = "never reported an outcome")]
    fn test_finalize_with_missing_outcome_is_a_contract_violation() {
        let mut builder = ReportBuilder::new(2);
        builder.record(0, succeeded("a.png"));
        let _ = builder.finalize();
    }
}
