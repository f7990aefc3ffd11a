//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per comunicazione
//! con il processo host (shell desktop, Python/Electron).
//!
//! ## Responsabilità:
//! - Emette messaggi JSON line-delimited per eventi di batch
//! - Fornisce il ciclo di eventi progress/error/complete come flusso
//!   consumabile da qualunque host
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch (destinazione, totale task, workers)
//! - `task_start`: Un worker ha reclamato un task
//! - `task_complete`: Outcome terminale di un task
//! - `complete`: Fine batch con i conteggi finali
//! - `error`: Errore fatale di batch (validazione, destinazione)

use crate::model::{BatchReport, TaskOutcome};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del batch
    #[serde(rename = "start")]
    Start {
        output_dir: PathBuf,
        total_tasks: usize,
        workers: usize,
    },

    /// Un worker ha reclamato un task
    #[serde(rename = "task_start")]
    TaskStart {
        name: String,
        path: PathBuf,
        index: usize,
        total: usize,
    },

    /// Outcome terminale di un singolo task
    #[serde(rename = "task_complete")]
    TaskComplete {
        index: usize,
        total: usize,
        outcome: TaskOutcome,
    },

    /// Batch completato
    #[serde(rename = "complete")]
    Complete {
        total: usize,
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        duration_seconds: f64,
    },

    /// Errore fatale di batch
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di inizio batch
    pub fn start(output_dir: PathBuf, total_tasks: usize, workers: usize) -> Self {
        Self::Start {
            output_dir,
            total_tasks,
            workers,
        }
    }

    /// Crea un messaggio di task reclamato
    pub fn task_start(name: String, path: PathBuf, index: usize, total: usize) -> Self {
        Self::TaskStart {
            name,
            path,
            index,
            total,
        }
    }

    /// Crea un messaggio di completamento task
    pub fn task_complete(index: usize, total: usize, outcome: TaskOutcome) -> Self {
        Self::TaskComplete {
            index,
            total,
            outcome,
        }
    }

    /// Crea un messaggio di completamento batch
    pub fn complete(report: &BatchReport, duration_seconds: f64) -> Self {
        Self::Complete {
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
            cancelled: report.cancelled,
            duration_seconds,
        }
    }

    /// Crea un messaggio di errore fatale
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}
