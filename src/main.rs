//! # Image Batch Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Assemblaggio della richiesta batch (da file JSON o da directory)
//! - Creazione della configurazione e avvio del coordinator
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (request file oppure directory + flag)
//! 2. Configura il logging su stderr (INFO o DEBUG a seconda di verbose)
//! 3. Costruisce `ProcessImagesOptions`: dal file di richiesta, oppure
//!    enumerando le immagini della directory di input
//! 4. Istanzia `BatchCoordinator` e processa il batch
//! 5. Stampa il report finale (JSON con `--json`)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-converter /path/to/pics --output /path/to/out --format webp --workers 8
//! image-converter --request batch.json --json
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use image_batch_converter::task::OutputFormat;
use image_batch_converter::{
    file_manager::FileManager, BatchCoordinator, Config, ImageTask, ProcessImagesOptions,
};

#[derive(Parser)]
#[command(name = "image-converter")]
#[command(about = "Convert, resize and re-encode batches of images with a bounded worker pool")]
struct Args {
    /// Directory containing images to convert (ignored when --request is given)
    #[arg(value_name = "INPUT_DIR", required_unless_present = "request")]
    input_dir: Option<PathBuf>,

    /// JSON file holding a full batch request (tasks, outputPath, workers)
    #[arg(long)]
    request: Option<PathBuf>,

    /// Output directory for converted files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target format: jpeg, png or webp (keeps each source's format if omitted)
    #[arg(short, long)]
    format: Option<String>,

    /// Encoding quality (1-100)
    #[arg(short, long, default_value = "80")]
    quality: i32,

    /// Target width in pixels (0 = derive from height, or no resize)
    #[arg(long, default_value = "0")]
    width: i64,

    /// Target height in pixels (0 = derive from width, or no resize)
    #[arg(long, default_value = "0")]
    height: i64,

    /// Keep original dimensions, ignoring --width and --height
    #[arg(long)]
    keep_original_size: bool,

    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    workers: i64,

    /// Overall batch timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Emit progress events and the final report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so --json output on stdout stays machine-parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let options = build_options(&args)?;

    let config = Config {
        json_output: args.json,
        batch_timeout_secs: args.timeout,
        max_workers: None,
    };

    let coordinator = BatchCoordinator::new(config)?;
    let report = coordinator.process(options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Assemble the batch request: verbatim from a request file, or by
/// enumerating the input directory.
fn build_options(args: &Args) -> Result<ProcessImagesOptions> {
    if let Some(ref request_path) = args.request {
        let content = std::fs::read_to_string(request_path).map_err(|e| {
            anyhow::anyhow!("Cannot read request file {}: {}", request_path.display(), e)
        })?;
        let options: ProcessImagesOptions = serde_json::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Malformed request file {}: {}", request_path.display(), e)
        })?;
        return Ok(options);
    }

    let input_dir = args
        .input_dir
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("An input directory or --request file is required"))?;
    if !input_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            input_dir.display()
        ));
    }
    let output = args
        .output
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("--output is required when scanning a directory"))?;

    // Fail fast on a bad --format instead of failing every task later
    if let Some(ref format) = args.format {
        if OutputFormat::parse(format).is_none() {
            return Err(anyhow::anyhow!("Unsupported output format: {}", format));
        }
    }

    let files = FileManager::list_images(input_dir)?;
    if files.is_empty() {
        return Err(anyhow::anyhow!(
            "No images found in {}",
            input_dir.display()
        ));
    }
    info!("Found {} images in {}", files.len(), input_dir.display());

    let tasks: Vec<ImageTask> = files
        .into_iter()
        .map(|file| ImageTask {
            name: file.name,
            path: file.path,
            output_format: args.format.clone().unwrap_or_default(),
            quality: args.quality,
            convert_format: args.format.is_some(),
            width: args.width,
            height: args.height,
            keep_original_size: args.keep_original_size,
        })
        .collect();

    Ok(ProcessImagesOptions {
        tasks,
        output_path: output.clone(),
        workers: args.workers,
    })
}
