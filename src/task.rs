//! # Task Descriptor Module
//!
//! Questo modulo trasforma gli `ImageTask` della richiesta nella forma
//! interna validata e immutabile consumata dal worker pool.
//!
//! ## Responsabilità:
//! - Verifica che la sorgente esista e sia un file regolare (fail fast,
//!   prima di consumare uno slot worker)
//! - Parsing del formato di output richiesto (`jpeg`/`jpg`, `png`, `webp`)
//! - Clamp della qualità in [1, 100] con advisory nel report
//! - Derivazione del piano di resize da `width`/`height`/`keepOriginalSize`
//! - Pianificazione della destinazione con risoluzione deterministica
//!   delle collisioni (suffisso `_1`, `_2`, ... in ordine di submission)
//!
//! ## Regole dimensioni:
//! - `keepOriginalSize = true` → nessun resize, dimensioni ignorate
//! - `(0, 0)` → nessun resize
//! - `(w, 0)` / `(0, h)` → l'asse mancante deriva dall'aspect ratio
//! - `(w, h)` → resize esatto
//! - Valori negativi vengono clampati a 0 con advisory

use crate::error::ProcessError;
use crate::model::ImageTask;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Supported target encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Parse a caller-supplied format name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    /// Map a decoded source format into the encodable set.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            image::ImageFormat::Png => Some(OutputFormat::Png),
            image::ImageFormat::WebP => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
            OutputFormat::WebP => write!(f, "webp"),
        }
    }
}

/// Resize step derived once at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// No resize step runs
    Keep,
    /// Exact target dimensions
    Exact { width: u32, height: u32 },
    /// Fixed width, height derived from the source aspect ratio
    Width(u32),
    /// Fixed height, width derived from the source aspect ratio
    Height(u32),
}

impl ResizePlan {
    fn derive(keep_original_size: bool, width: i64, height: i64) -> Self {
        if keep_original_size {
            return ResizePlan::Keep;
        }
        let width = width.clamp(0, u32::MAX as i64) as u32;
        let height = height.clamp(0, u32::MAX as i64) as u32;
        match (width, height) {
            (0, 0) => ResizePlan::Keep,
            (w, 0) => ResizePlan::Width(w),
            (0, h) => ResizePlan::Height(h),
            (w, h) => ResizePlan::Exact {
                width: w,
                height: h,
            },
        }
    }
}

/// Validated, immutable form of one requested conversion.
///
/// Created fresh per batch from `ImageTask` inputs; never mutated after
/// being queued.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    /// Position in the submitted task list, used to order the report
    pub index: usize,
    pub name: String,
    pub source: PathBuf,
    /// Final destination, already collision-resolved
    pub destination: PathBuf,
    /// Target encoding; `None` keeps the source's decoded format
    pub format: Option<OutputFormat>,
    pub quality: u8,
    pub resize: ResizePlan,
    /// Normalization notes accumulated during validation
    pub advisory: Option<String>,
}

impl TaskDescriptor {
    /// Validate and normalize one submitted task.
    ///
    /// `taken` holds the destinations already claimed by earlier tasks in
    /// the same batch; a collision is resolved by suffixing the stem.
    pub fn from_task(
        index: usize,
        task: &ImageTask,
        output_dir: &Path,
        taken: &mut HashSet<PathBuf>,
    ) -> Result<Self, ProcessError> {
        let metadata = match std::fs::metadata(&task.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProcessError::SourceMissing(task.path.clone()));
            }
            Err(e) => return Err(ProcessError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(ProcessError::Validation(format!(
                "source is not a regular file: {}",
                task.path.display()
            )));
        }

        let format = if task.convert_format {
            let parsed = OutputFormat::parse(&task.output_format).ok_or_else(|| {
                ProcessError::Validation(format!(
                    "convertFormat is set but output format {:?} is not supported",
                    task.output_format
                ))
            })?;
            Some(parsed)
        } else {
            None
        };

        let mut advisories = Vec::new();

        let quality = task.quality.clamp(1, 100) as u8;
        if i32::from(quality) != task.quality {
            advisories.push(format!(
                "quality {} out of range, clamped to {}",
                task.quality, quality
            ));
        }

        let (width, height) = (task.width, task.height);
        if width < 0 || height < 0 {
            advisories.push(format!(
                "negative dimensions {}x{} treated as 0",
                width, height
            ));
        }
        let resize = ResizePlan::derive(task.keep_original_size, width.max(0), height.max(0));

        let filename = output_filename(&task.name, &task.path, format)?;
        let (destination, renamed) = unique_destination(output_dir, &filename, taken);
        if renamed {
            advisories.push(format!(
                "destination collision, renamed to {}",
                destination
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ));
        }
        taken.insert(destination.clone());

        Ok(Self {
            index,
            name: task.name.clone(),
            source: task.path.clone(),
            destination,
            format,
            quality,
            resize,
            advisory: if advisories.is_empty() {
                None
            } else {
                Some(advisories.join("; "))
            },
        })
    }
}

/// Keep the display name, swapping the extension only when a format
/// conversion was requested.
fn output_filename(
    name: &str,
    source: &Path,
    format: Option<OutputFormat>,
) -> Result<String, ProcessError> {
    // Strip any directory components a hostile caller may have smuggled in.
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .ok_or_else(|| {
            ProcessError::Validation(format!("task has no usable file name: {:?}", name))
        })?;

    match format {
        Some(fmt) => {
            let stem = Path::new(&base)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| base.clone());
            Ok(format!("{}.{}", stem, fmt.extension()))
        }
        None => Ok(base),
    }
}

/// Deterministic collision resolution: the later task in submission order
/// gets `_1`, `_2`, ... appended to its stem.
fn unique_destination(
    output_dir: &Path,
    filename: &str,
    taken: &HashSet<PathBuf>,
) -> (PathBuf, bool) {
    let candidate = output_dir.join(filename);
    if !taken.contains(&candidate) {
        return (candidate, false);
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 1.. {
        let renamed = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = output_dir.join(renamed);
        if !taken.contains(&candidate) {
            return (candidate, true);
        }
    }
    unreachable!("collision counter exhausted");
}
