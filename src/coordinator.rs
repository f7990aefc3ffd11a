//! # Batch Coordinator Module
//!
//! Questo è il modulo che orchestra l'intero processo di conversione.
//!
//! ## Responsabilità:
//! - Valida la richiesta (`ProcessImagesOptions`) prima di avviare worker
//! - Crea la directory di destinazione una volta sola, prima del dispatch
//! - Coercizza `workers` in `[1, N_max]` (N_max = parallelismo CPU o
//!   tetto da config), poi al numero di task eseguibili
//! - Trasforma i task in descriptor validati; i task invalidi diventano
//!   outcome `failed` senza mai raggiungere il pool
//! - Guida il worker pool fino al completamento e finalizza il report
//!
//! ## Flusso di esecuzione:
//! 1. **Validazione batch**: task non vuoti, destinazione non vuota
//! 2. **Preparazione destinazione**: `create_dir_all` + canonicalizzazione
//! 3. **Validazione sequenziale task**: fail fast prima di consumare slot
//! 4. **Dispatch**: pool con concorrenza coercizzata
//! 5. **Aggregazione**: un outcome terminale per ogni task sottomesso
//! 6. **Report finale**: conteggi, raggruppamento errori, ordine di
//!    submission
//!
//! ## Error handling:
//! - Errori batch-fatali (richiesta malformata, destinazione non creabile)
//!   vengono propagati al caller prima di qualsiasi lavoro
//! - Errori di singoli task non attraversano mai il confine del worker:
//!   diventano voci del report
//!
//! ## Cancellazione:
//! - `process_with_cancel` accetta un `CancelHandle` esterno; il timeout
//!   di batch configurato agisce sullo stesso handle

use crate::{
    config::Config,
    convert,
    error::ProcessError,
    json_output::JsonMessage,
    model::{BatchReport, ProcessImagesOptions, TaskOutcome},
    pool::{CancelHandle, WorkerPool},
    progress::{BatchStats, ProgressManager},
    report::ReportBuilder,
    task::TaskDescriptor,
};
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Main batch coordinator
pub struct BatchCoordinator {
    config: Config,
}

impl BatchCoordinator {
    /// Create a new coordinator instance
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Process one batch to completion.
    pub async fn process(&self, options: ProcessImagesOptions) -> Result<BatchReport> {
        self.process_with_cancel(options, CancelHandle::new()).await
    }

    /// Process one batch with an externally-owned cancellation handle.
    ///
    /// Resolves only after every submitted task has a terminal outcome.
    pub async fn process_with_cancel(
        &self,
        options: ProcessImagesOptions,
        cancel: CancelHandle,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        let total = options.tasks.len();

        if total == 0 {
            return Err(self.fatal("batch contains no tasks".to_string()));
        }
        if options.output_path.as_os_str().is_empty() {
            return Err(self.fatal("output path is empty".to_string()));
        }

        // One absolute destination, shared read-only by all workers.
        let output_dir = self.prepare_output_dir(&options.output_path)?;

        let ceiling = self.config.worker_ceiling();
        let workers = coerce_workers(options.workers, ceiling, total);
        debug!(
            "Worker count {} (requested {}, ceiling {})",
            workers, options.workers, ceiling
        );

        info!("Starting image batch: {} tasks", total);
        info!("📁 Output directory: {}", output_dir.display());
        info!("🧵 Workers: {}", workers);
        if self.config.json_output {
            JsonMessage::start(output_dir.clone(), total, workers).emit();
        }

        let progress = if self.config.json_output {
            ProgressManager::hidden()
        } else {
            ProgressManager::new(total as u64)
        };

        // Sequential validation pass: invalid tasks fail here, cheaply,
        // before consuming a worker slot.
        let mut builder = ReportBuilder::new(total);
        let mut taken = HashSet::new();
        let mut queue = Vec::new();
        for (index, task) in options.tasks.iter().enumerate() {
            match TaskDescriptor::from_task(index, task, &output_dir, &mut taken) {
                Ok(descriptor) => queue.push(descriptor),
                Err(e) => {
                    warn!("Task {} rejected in validation: {}", task.name, e);
                    let outcome = TaskOutcome::failed(
                        task.name.clone(),
                        task.path.clone(),
                        e.kind(),
                        e.to_string(),
                        None,
                    );
                    progress.update(&BatchStats::task_message(&outcome));
                    if self.config.json_output {
                        JsonMessage::task_complete(index, total, outcome.clone()).emit();
                    }
                    builder.record(index, outcome);
                }
            }
        }

        if builder.recorded() > 0 {
            debug!("Validation rejected {} of {} tasks", builder.recorded(), total);
        }

        let timeout_guard = self.config.batch_timeout_secs.map(|secs| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                warn!("⏱ Batch timeout after {}s - cancelling remaining tasks", secs);
                cancel.cancel();
            })
        });

        if !queue.is_empty() {
            let workers = workers.min(queue.len());
            let json_output = self.config.json_output;

            let operation = move |descriptor: &TaskDescriptor| {
                if json_output {
                    JsonMessage::task_start(
                        descriptor.name.clone(),
                        descriptor.source.clone(),
                        descriptor.index,
                        total,
                    )
                    .emit();
                }
                convert::execute(descriptor)
            };

            let observer_progress = progress.clone();
            let observer = move |index: usize, outcome: &TaskOutcome| {
                observer_progress.update(&BatchStats::task_message(outcome));
                if json_output {
                    JsonMessage::task_complete(index, total, outcome.clone()).emit();
                }
            };

            let run = WorkerPool::run(queue, workers, cancel, operation, observer).await;
            debug!("Peak concurrent tasks: {}", run.peak_in_flight);
            for (index, outcome) in run.outcomes {
                builder.record(index, outcome);
            }
        }

        if let Some(handle) = timeout_guard {
            handle.abort();
        }

        let report = builder.finalize();
        let mut stats = BatchStats::new();
        for outcome in &report.outcomes {
            stats.add(outcome);
        }
        progress.finish(&stats.format_summary());

        let duration = started.elapsed().as_secs_f64();
        info!("=== Batch Complete ===");
        info!("Tasks submitted: {}", report.total);
        info!("Succeeded: {}", report.succeeded);
        info!("Failed: {}", report.failed);
        info!("Cancelled: {}", report.cancelled);
        info!("Duration: {:.2}s", duration);
        if self.config.json_output {
            JsonMessage::complete(&report, duration).emit();
        }

        Ok(report)
    }

    /// Create the destination once, before dispatch. Failure here is fatal
    /// for the whole batch.
    fn prepare_output_dir(&self, output_path: &PathBuf) -> Result<PathBuf> {
        std::fs::create_dir_all(output_path).map_err(|e| {
            self.fatal(format!(
                "cannot create output directory {}: {}",
                output_path.display(),
                e
            ))
        })?;
        output_path.canonicalize().map_err(|e| {
            self.fatal(format!(
                "cannot resolve output directory {}: {}",
                output_path.display(),
                e
            ))
        })
    }

    fn fatal(&self, message: String) -> anyhow::Error {
        if self.config.json_output {
            JsonMessage::error(message.clone(), None).emit();
        }
        ProcessError::Validation(message).into()
    }
}

/// Coerce the requested concurrency into `[1, ceiling]`, then cap it at
/// the number of runnable tasks.
fn coerce_workers(requested: i64, ceiling: usize, runnable: usize) -> usize {
    let ceiling = ceiling.max(1) as i64;
    let workers = requested.clamp(1, ceiling) as usize;
    workers.min(runnable.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorKind, ImageTask, TaskStatus};
    use std::path::Path;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 60, 255]));
        image::DynamicImage::ImageRgba8(img).save(path).unwrap();
    }

    fn task(name: &str, path: &Path) -> ImageTask {
        ImageTask {
            name: name.to_string(),
            path: path.to_path_buf(),
            output_format: String::new(),
            quality: 80,
            convert_format: false,
            width: 0,
            height: 0,
            keep_original_size: false,
        }
    }

    fn coordinator() -> BatchCoordinator {
        BatchCoordinator::new(Config::default()).unwrap()
    }

    #[test]
    fn test_coerce_workers() {
        assert_eq!(coerce_workers(0, 8, 5), 1);
        assert_eq!(coerce_workers(-3, 8, 5), 1);
        assert_eq!(coerce_workers(100, 8, 5), 5);
        assert_eq!(coerce_workers(100, 3, 5), 3);
        assert_eq!(coerce_workers(2, 8, 5), 2);
        assert_eq!(coerce_workers(4, 8, 0), 1);
    }

    #[tokio::test]
    async fn test_mixed_batch_partial_failure() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let a = dir.path().join("a.png");
        let c = dir.path().join("c.png");
        write_png(&a, 8, 8);
        write_png(&c, 8, 8);

        let options = ProcessImagesOptions {
            tasks: vec![
                task("a.png", &a),
                task("b.png", &dir.path().join("b.png")),
                task("c.png", &c),
            ],
            output_path: out.clone(),
            workers: 2,
        };

        let report = coordinator().process(options).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 0);

        assert_eq!(report.outcomes[0].status, TaskStatus::Succeeded);
        assert_eq!(report.outcomes[1].status, TaskStatus::Failed);
        assert_eq!(
            report.outcomes[1].error_kind,
            Some(ErrorKind::SourceMissing)
        );
        assert_eq!(report.outcomes[2].status, TaskStatus::Succeeded);

        let canonical_out = out.canonicalize().unwrap();
        for outcome in [&report.outcomes[0], &report.outcomes[2]] {
            let destination = outcome.destination_path.as_ref().unwrap();
            assert!(destination.starts_with(&canonical_out));
            assert!(destination.exists());
        }
        assert_eq!(report.failed_by_kind[&ErrorKind::SourceMissing], 1);
    }

    #[tokio::test]
    async fn test_hostile_worker_counts_still_run() {
        for workers in [0, -7] {
            let dir = TempDir::new().unwrap();
            let a = dir.path().join("a.png");
            write_png(&a, 4, 4);

            let options = ProcessImagesOptions {
                tasks: vec![task("a.png", &a)],
                output_path: dir.path().join("out"),
                workers,
            };

            let report = coordinator().process(options).await.unwrap();
            assert_eq!(report.total, 1);
            assert_eq!(report.succeeded, 1);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_fatal() {
        let dir = TempDir::new().unwrap();
        let options = ProcessImagesOptions {
            tasks: vec![],
            output_path: dir.path().join("out"),
            workers: 1,
        };
        assert!(coordinator().process(options).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_output_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 4, 4);

        let options = ProcessImagesOptions {
            tasks: vec![task("a.png", &a)],
            output_path: PathBuf::new(),
            workers: 1,
        };
        assert!(coordinator().process(options).await.is_err());
    }

    #[tokio::test]
    async fn test_uncreatable_output_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 4, 4);

        let options = ProcessImagesOptions {
            tasks: vec![task("a.png", &a)],
            output_path: blocker.join("out"),
            workers: 1,
        };
        assert!(coordinator().process(options).await.is_err());
    }

    #[tokio::test]
    async fn test_nested_output_directory_created() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("deep").join("nested").join("out");
        let a = dir.path().join("a.png");
        write_png(&a, 4, 4);

        let options = ProcessImagesOptions {
            tasks: vec![task("a.png", &a)],
            output_path: out.clone(),
            workers: 1,
        };

        let report = coordinator().process(options).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(out.is_dir());
    }

    #[tokio::test]
    async fn test_colliding_destinations_renamed() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b").join("a.png");
        write_png(&a, 4, 4);
        std::fs::create_dir(dir.path().join("b")).unwrap();
        write_png(&b, 6, 6);

        let options = ProcessImagesOptions {
            tasks: vec![task("a.png", &a), task("a.png", &b)],
            output_path: dir.path().join("out"),
            workers: 2,
        };

        let report = coordinator().process(options).await.unwrap();
        assert_eq!(report.succeeded, 2);

        let first = report.outcomes[0].destination_path.as_ref().unwrap();
        let second = report.outcomes[1].destination_path.as_ref().unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().contains("a_1"));
        assert!(first.exists() && second.exists());
        assert!(report.outcomes[1]
            .advisory
            .as_deref()
            .unwrap()
            .contains("collision"));
    }

    #[tokio::test]
    async fn test_outcomes_follow_submission_order() {
        let dir = TempDir::new().unwrap();
        let mut tasks = Vec::new();
        for i in 0..6 {
            let path = dir.path().join(format!("img{}.png", i));
            write_png(&path, 4 + i, 4 + i);
            tasks.push(task(&format!("img{}.png", i), &path));
        }

        let options = ProcessImagesOptions {
            tasks,
            output_path: dir.path().join("out"),
            workers: 3,
        };

        let report = coordinator().process(options).await.unwrap();
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "img0.png", "img1.png", "img2.png", "img3.png", "img4.png", "img5.png"
            ]
        );
    }

    #[tokio::test]
    async fn test_precancelled_batch_reports_cancelled() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_png(&a, 4, 4);
        write_png(&b, 4, 4);

        let options = ProcessImagesOptions {
            tasks: vec![task("a.png", &a), task("b.png", &b)],
            output_path: dir.path().join("out"),
            workers: 2,
        };

        let cancel = CancelHandle::new();
        cancel.cancel();

        let report = coordinator()
            .process_with_cancel(options, cancel)
            .await
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.succeeded + report.failed, 0);
        for outcome in &report.outcomes {
            assert_eq!(outcome.status, TaskStatus::Cancelled);
            assert!(outcome.error_kind.is_none());
        }
    }

    #[tokio::test]
    async fn test_quality_clamp_surfaces_as_advisory() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 4, 4);

        let mut clamped = task("a.png", &a);
        clamped.quality = 400;
        clamped.convert_format = true;
        clamped.output_format = "jpeg".to_string();

        let options = ProcessImagesOptions {
            tasks: vec![clamped],
            output_path: dir.path().join("out"),
            workers: 1,
        };

        let report = coordinator().process(options).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(report.outcomes[0]
            .advisory
            .as_deref()
            .unwrap()
            .contains("clamped"));
    }
}
