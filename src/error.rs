//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `ProcessError` per categorizzare gli errori di elaborazione
//! - Mappa ogni errore sulla classificazione wire (`ErrorKind`) del report
//! - Integra con `thiserror` per automatic error conversion
//! - Rileva condizioni di esaurimento risorse (disco pieno, quota)
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O generici (permessi, read falliti, etc.)
//! - `SourceMissing`: File sorgente sparito tra validazione e dispatch
//! - `Decode`: Sorgente non decodificabile come immagine
//! - `UnsupportedFormat`: Formato richiesto o sorgente fuori dal set supportato
//! - `Encode`: Ri-codifica fallita
//! - `Write`: Scrittura o rename della destinazione fallito
//! - `Resource`: Disco pieno / quota superata (ferma il claim di nuovi task)
//! - `Validation`: Input invalido, rigettato prima del dispatch

use crate::model::ErrorKind;
use std::path::PathBuf;

/// Custom error type for one image conversion task.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("decode error: {0}")]
    Decode(image::ImageError),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("destination write error: {0}")]
    Write(std::io::Error),

    #[error("resource exhausted: {0}")]
    Resource(std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// True for I/O failures that will not clear up by moving on to the next
/// task (full destination volume, exceeded quota).
pub fn io_is_resource_exhaustion(error: &std::io::Error) -> bool {
    io_kind_is_resource_exhaustion(error.kind())
}

fn io_kind_is_resource_exhaustion(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded
    )
}

impl ProcessError {
    /// Wire classification for the batch report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::SourceMissing,
                k if io_kind_is_resource_exhaustion(k) => ErrorKind::Resource,
                _ => ErrorKind::Write,
            },
            ProcessError::SourceMissing(_) => ErrorKind::SourceMissing,
            ProcessError::Decode(_) => ErrorKind::Decode,
            ProcessError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ProcessError::Encode(_) => ErrorKind::Encode,
            ProcessError::Write(_) => ErrorKind::Write,
            ProcessError::Resource(_) => ErrorKind::Resource,
            ProcessError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// True when the pool should stop claiming further tasks.
    pub fn is_resource_exhaustion(&self) -> bool {
        self.kind() == ErrorKind::Resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let missing = ProcessError::SourceMissing(PathBuf::from("/nope.png"));
        assert_eq!(missing.kind(), ErrorKind::SourceMissing);

        let write = ProcessError::Write(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(write.kind(), ErrorKind::Write);
        assert!(!write.is_resource_exhaustion());

        let validation = ProcessError::Validation("empty format".to_string());
        assert_eq!(validation.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_resource_exhaustion_detection() {
        let full = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        assert!(io_is_resource_exhaustion(&full));

        let resource = ProcessError::Resource(full);
        assert_eq!(resource.kind(), ErrorKind::Resource);
        assert!(resource.is_resource_exhaustion());
    }

    #[test]
    fn test_not_found_io_maps_to_source_missing() {
        let e: ProcessError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(e.kind(), ErrorKind::SourceMissing);
    }
}
