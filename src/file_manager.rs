//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file e la discovery di immagini.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di immagini in una directory, come `FileInfo`
//!   pronti per essere trasformati in task da un caller
//! - Determinazione del formato file dall'estensione (solo filtro
//!   discovery; il contenuto viene sempre ri-verificato in decodifica)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati riconosciuti in discovery:
//! - JPG, JPEG, PNG, WebP
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::list_images(Path::new("/path/to/pics"))?;
//! for file in &files {
//!     println!("{} ({})", file.name, FileManager::format_size(file.size));
//! }
//! ```

use crate::model::FileInfo;
use anyhow::Result;
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Enumerate all supported images under a directory.
    ///
    /// Each entry gets a fresh opaque id, stable for the lifetime of the
    /// returned listing. Entries come back in deterministic path order.
    pub fn list_images(directory: &Path) -> Result<Vec<FileInfo>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !Self::is_image_file(path) {
                continue;
            }
            let metadata = entry.metadata()?;
            files.push(FileInfo {
                id: Uuid::new_v4().to_string(),
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                path: path.to_path_buf(),
            });
        }

        Ok(files)
    }

    /// Check if a path looks like a supported image
    pub fn is_image_file(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "jpg" | "jpeg" | "png" | "webp")
        } else {
            false
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
