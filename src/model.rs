//! # Wire Data Model Module
//!
//! Questo modulo definisce il contratto dati scambiato con il processo host
//! (shell desktop, script Python/Electron o CLI).
//!
//! ## Responsabilità:
//! - Definisce le strutture di richiesta (`ProcessImagesOptions`, `ImageTask`)
//! - Definisce le strutture di risposta (`BatchReport`, `TaskOutcome`)
//! - Espone `FileInfo` per l'enumerazione dei file da parte del caller
//! - Mantiene i nomi campo camelCase attesi dal layer di marshalling dei caller
//!
//! ## Convenzioni:
//! - Tutti i campi viaggiano in camelCase (`outputFormat`, `keepOriginalSize`)
//! - I campi opzionali della richiesta hanno default serde, così una
//!   richiesta parziale deserializza senza errori
//! - `workers`, `quality`, `width`, `height` sono interi con segno: valori
//!   ostili (0, negativi) sopravvivono alla deserializzazione e vengono
//!   coercizzati in validazione, mai rigettati dal parser
//!
//! ## Esempio di richiesta:
//! ```json
//! {
//!   "tasks": [{"name": "photo.png", "path": "/pics/photo.png",
//!              "outputFormat": "webp", "quality": 80,
//!              "convertFormat": true, "width": 1200, "height": 0,
//!              "keepOriginalSize": false}],
//!   "outputPath": "/pics/out",
//!   "workers": 4
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifies one file available for processing, as enumerated for a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Opaque unique identifier, stable for the lifetime of a session
    pub id: String,
    /// Display name (not guaranteed unique)
    pub name: String,
    /// Byte length
    pub size: u64,
    /// Absolute filesystem path
    pub path: PathBuf,
}

/// One requested conversion, as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTask {
    /// Display name of the source file, used to derive the output filename
    pub name: String,
    /// Source file path
    pub path: PathBuf,
    /// Target encoding; required when `convert_format` is true, ignored otherwise
    #[serde(default)]
    pub output_format: String,
    /// Encoding quality (1-100); out-of-range values are clamped in validation
    #[serde(default = "default_quality")]
    pub quality: i32,
    /// If false, output keeps the source's native format regardless of `output_format`
    #[serde(default)]
    pub convert_format: bool,
    /// Target width in pixels; 0 derives from aspect ratio or disables resize
    #[serde(default)]
    pub width: i64,
    /// Target height in pixels; 0 derives from aspect ratio or disables resize
    #[serde(default)]
    pub height: i64,
    /// If true, `width`/`height` are ignored and no resize step runs
    #[serde(default)]
    pub keep_original_size: bool,
}

fn default_quality() -> i32 {
    80
}

/// One batch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessImagesOptions {
    /// Ordered sequence of tasks; order is preserved in the result report
    pub tasks: Vec<ImageTask>,
    /// Destination directory; created if absent, shared by all task outputs
    pub output_path: PathBuf,
    /// Requested concurrency; coerced into `[1, N_max]` before dispatch
    #[serde(default)]
    pub workers: i64,
}

/// Terminal state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Classification of a task failure.
///
/// Distinguishes a missing source from decode, encode and write failures so
/// the caller can tell a bad input apart from a bad destination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before dispatch (bad format name, unreadable source, ...)
    Validation,
    /// Source path missing or not a regular file
    SourceMissing,
    /// Source could not be decoded as an image
    Decode,
    /// Source or requested format outside the supported set
    UnsupportedFormat,
    /// Re-encoding failed
    Encode,
    /// Destination write or rename failed
    Write,
    /// Disk-full / quota class condition; halts claiming of further tasks
    Resource,
    /// Unexpected fault (panic) inside a conversion worker
    Internal,
}

/// Terminal per-task result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    /// Display name from the submitted task
    pub name: String,
    /// Source path from the submitted task
    pub path: PathBuf,
    /// Final destination, present only on success
    pub destination_path: Option<PathBuf>,
    pub status: TaskStatus,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// Normalization note (quality clamp, collision rename), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

impl TaskOutcome {
    pub fn succeeded(
        name: String,
        path: PathBuf,
        destination: PathBuf,
        advisory: Option<String>,
    ) -> Self {
        Self {
            name,
            path,
            destination_path: Some(destination),
            status: TaskStatus::Succeeded,
            error_kind: None,
            error_message: None,
            advisory,
        }
    }

    pub fn failed(
        name: String,
        path: PathBuf,
        kind: ErrorKind,
        message: String,
        advisory: Option<String>,
    ) -> Self {
        Self {
            name,
            path,
            destination_path: None,
            status: TaskStatus::Failed,
            error_kind: Some(kind),
            error_message: Some(message),
            advisory,
        }
    }

    pub fn cancelled(name: String, path: PathBuf) -> Self {
        Self {
            name,
            path,
            destination_path: None,
            status: TaskStatus::Cancelled,
            error_kind: None,
            error_message: None,
            advisory: None,
        }
    }
}

/// Aggregated result of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Total tasks submitted, including validation rejections
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Failure counts grouped by classification
    pub failed_by_kind: BTreeMap<ErrorKind, usize>,
    /// One entry per submitted task, in submission order
    pub outcomes: Vec<TaskOutcome>,
}
