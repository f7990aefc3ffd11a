//! # Image Operation Module
//!
//! Questo modulo implementa l'operazione opaca "converti una immagine":
//! decodifica, resize opzionale, ri-codifica e scrittura atomica.
//!
//! ## Responsabilità:
//! - Decodifica della sorgente con formato riconosciuto dal contenuto,
//!   non dall'estensione
//! - Resize secondo il piano del descriptor (Lanczos3)
//! - Ri-codifica quality-aware: JPEG e WebP rispettano `quality`,
//!   PNG è lossless e la ignora
//! - Scrittura atomica: encode in memoria, tempfile nella directory di
//!   destinazione, poi rename (mai file parziali sulla destinazione)
//!
//! ## Concorrenza:
//! - L'intera funzione è bloccante (CPU + I/O); il pool la esegue dentro
//!   `tokio::task::spawn_blocking`
//! - Nessuno stato condiviso: un descriptor entra, un path esce

use crate::error::{io_is_resource_exhaustion, ProcessError};
use crate::task::{OutputFormat, ResizePlan, TaskDescriptor};
use image::GenericImageView;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Run one conversion task to completion.
///
/// Blocking; returns the destination path on success. Every failure mode
/// maps to a `ProcessError` variant so the worker can classify it without
/// inspecting strings.
pub fn execute(task: &TaskDescriptor) -> Result<PathBuf, ProcessError> {
    let reader = match image::io::Reader::open(&task.source) {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProcessError::SourceMissing(task.source.clone()));
        }
        Err(e) => return Err(ProcessError::Io(e)),
    };
    let reader = reader.with_guessed_format().map_err(ProcessError::Io)?;
    let source_format = reader.format();
    let img = reader.decode().map_err(ProcessError::Decode)?;

    // Keep the source's native format unless a conversion was requested.
    let format = match task.format {
        Some(format) => format,
        None => source_format
            .and_then(OutputFormat::from_image_format)
            .ok_or_else(|| {
                ProcessError::UnsupportedFormat(format!(
                    "source format of {} is not in the encodable set",
                    task.source.display()
                ))
            })?,
    };

    let (source_width, source_height) = img.dimensions();
    let img = match target_dimensions(source_width, source_height, task.resize) {
        Some((width, height)) => {
            debug!(
                "Resizing {} from {}x{} to {}x{}",
                task.source.display(),
                source_width,
                source_height,
                width,
                height
            );
            img.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
        }
        None => img,
    };

    let bytes = encode(&img, format, task.quality)?;
    write_atomic(&task.destination, &bytes)?;

    debug!(
        "Wrote {} ({} bytes, {})",
        task.destination.display(),
        bytes.len(),
        format
    );
    Ok(task.destination.clone())
}

/// Resolve the resize plan against the source dimensions.
///
/// Returns `None` when no resize step should run. A derived axis rounds
/// from the source aspect ratio with a floor of one pixel.
pub fn target_dimensions(
    source_width: u32,
    source_height: u32,
    plan: ResizePlan,
) -> Option<(u32, u32)> {
    if source_width == 0 || source_height == 0 {
        return None;
    }
    let target = match plan {
        ResizePlan::Keep => return None,
        ResizePlan::Exact { width, height } => (width, height),
        ResizePlan::Width(width) => (width, derive_axis(width, source_height, source_width)),
        ResizePlan::Height(height) => (derive_axis(height, source_width, source_height), height),
    };
    if target == (source_width, source_height) {
        None
    } else {
        Some(target)
    }
}

fn derive_axis(fixed: u32, source_other: u32, source_fixed: u32) -> u32 {
    let derived =
        (u64::from(fixed) * u64::from(source_other) + u64::from(source_fixed) / 2)
            / u64::from(source_fixed);
    (derived as u32).max(1)
}

fn encode(
    img: &image::DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, ProcessError> {
    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let mut buf = Vec::new();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
            encoder
                .encode_image(&rgb)
                .map_err(|e| ProcessError::Encode(e.to_string()))?;
            Ok(buf)
        }
        OutputFormat::Png => {
            let mut buf = Vec::new();
            img.write_to(
                &mut std::io::Cursor::new(&mut buf),
                image::ImageOutputFormat::Png,
            )
            .map_err(|e| ProcessError::Encode(e.to_string()))?;
            Ok(buf)
        }
        OutputFormat::WebP => {
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
            Ok(encoder.encode(f32::from(quality)).to_vec())
        }
    }
}

/// Write to a temporary file in the destination directory, then rename.
/// A crash or failure mid-write never leaves a partial file at the final
/// path.
fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<(), ProcessError> {
    let parent = destination.parent().ok_or_else(|| {
        ProcessError::Write(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("destination has no parent directory: {}", destination.display()),
        ))
    })?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".convert-")
        .tempfile_in(parent)
        .map_err(classify_write_error)?;
    tmp.write_all(bytes).map_err(classify_write_error)?;
    tmp.persist(destination)
        .map_err(|e| classify_write_error(e.error))?;
    Ok(())
}

fn classify_write_error(error: std::io::Error) -> ProcessError {
    if io_is_resource_exhaustion(&error) {
        ProcessError::Resource(error)
    } else {
        ProcessError::Write(error)
    }
}
