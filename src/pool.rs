//! # Worker Pool Module
//!
//! Questo modulo esegue i task validati su un numero fisso di worker.
//!
//! ## Responsabilità:
//! - Avvia esattamente `workers` executor concorrenti
//! - Ogni executor pesca il prossimo task da una coda condivisa protetta
//!   da mutex: un descriptor appartiene sempre a un solo executor
//! - Il lavoro sui pixel gira dentro `spawn_blocking` per non bloccare il
//!   runtime async
//! - Gli outcome viaggiano su un canale mpsc verso un accumulatore a
//!   scrittore singolo
//!
//! ## Isolamento dei fallimenti:
//! - Un errore (o un panic, intercettato come `JoinError`) di un task
//!   diventa un outcome `failed` e non ferma il pool né i task fratelli:
//!   questa è la proprietà di correttezza centrale del componente
//! - Un errore classificato come esaurimento risorse (disco pieno) attiva
//!   la cancellazione: il task in volo resta `failed`, i task mai
//!   reclamati diventano `cancelled`
//!
//! ## Cancellazione:
//! - `CancelHandle` è un flag condiviso controllato prima di ogni claim;
//!   i task in volo finiscono, quelli non reclamati vengono riportati
//!   `cancelled`, mai `failed`
//!
//! ## Strumentazione:
//! - Il pool mantiene un gauge dei task in volo e registra il picco, così
//!   il bound di concorrenza (`picco <= workers`) è osservabile nei test

use crate::error::ProcessError;
use crate::model::{ErrorKind, TaskOutcome};
use crate::task::TaskDescriptor;
use futures::future::join_all;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Cancellation handle shared by the coordinator, batch timeout and workers.
///
/// Cancelling stops workers from claiming new tasks; in-flight tasks run to
/// their terminal outcome.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of driving one queue to completion.
#[derive(Debug)]
pub struct PoolRun {
    /// One `(submission index, outcome)` per descriptor handed to `run`
    pub outcomes: Vec<(usize, TaskOutcome)>,
    /// Highest number of tasks observed running simultaneously
    pub peak_in_flight: usize,
}

pub struct WorkerPool;

impl WorkerPool {
    /// Drive every descriptor to a terminal outcome with `workers`
    /// concurrent executors.
    ///
    /// The operation is the opaque "convert one image" primitive; it runs
    /// on the blocking thread pool and its failures (including panics) are
    /// confined to the task that raised them. The observer sees every
    /// outcome as it is produced (progress bars, event streams) before the
    /// final collection.
    pub async fn run<F, O>(
        descriptors: Vec<TaskDescriptor>,
        workers: usize,
        cancel: CancelHandle,
        operation: F,
        observer: O,
    ) -> PoolRun
    where
        F: Fn(&TaskDescriptor) -> Result<PathBuf, ProcessError> + Send + Sync + 'static,
        O: Fn(usize, &TaskOutcome) + Send + Sync + 'static,
    {
        let queue: Arc<Mutex<VecDeque<TaskDescriptor>>> =
            Arc::new(Mutex::new(descriptors.into()));
        let operation = Arc::new(operation);
        let observer = Arc::new(observer);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<(usize, TaskOutcome)>();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let operation = Arc::clone(&operation);
            let observer = Arc::clone(&observer);
            let outcome_tx = outcome_tx.clone();
            let cancel = cancel.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);

            handles.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!("Worker {} stopping: cancellation observed", worker_id);
                        break;
                    }

                    let next = lock_queue(&queue).pop_front();
                    let Some(descriptor) = next else {
                        debug!("Worker {} stopping: queue exhausted", worker_id);
                        break;
                    };

                    let index = descriptor.index;
                    let name = descriptor.name.clone();
                    let source = descriptor.source.clone();
                    let advisory = descriptor.advisory.clone();

                    let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(running, Ordering::SeqCst);

                    let operation = Arc::clone(&operation);
                    let result =
                        tokio::task::spawn_blocking(move || operation(&descriptor)).await;

                    in_flight.fetch_sub(1, Ordering::SeqCst);

                    let outcome = match result {
                        Ok(Ok(destination)) => {
                            debug!("Worker {} finished {}", worker_id, name);
                            TaskOutcome::succeeded(name, source, destination, advisory)
                        }
                        Ok(Err(e)) => {
                            if e.is_resource_exhaustion() {
                                error!(
                                    "Resource exhaustion on {}: {} - halting claim of new tasks",
                                    source.display(),
                                    e
                                );
                                cancel.cancel();
                            } else {
                                warn!("Task {} failed: {}", name, e);
                            }
                            TaskOutcome::failed(name, source, e.kind(), e.to_string(), advisory)
                        }
                        Err(join_error) => {
                            // A panic inside the conversion must not take
                            // the pool down with it.
                            error!("Task {} aborted: {}", name, join_error);
                            TaskOutcome::failed(
                                name,
                                source,
                                ErrorKind::Internal,
                                format!("conversion aborted: {}", join_error),
                                advisory,
                            )
                        }
                    };

                    observer(index, &outcome);
                    if outcome_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(outcome_tx);

        join_all(handles).await;

        let mut outcomes = Vec::new();
        while let Some(item) = outcome_rx.recv().await {
            outcomes.push(item);
        }

        // Whatever was never claimed was cancelled, not failed.
        let remaining: Vec<TaskDescriptor> = lock_queue(&queue).drain(..).collect();
        for descriptor in remaining {
            debug!("Task {} cancelled before being claimed", descriptor.name);
            let index = descriptor.index;
            let outcome = TaskOutcome::cancelled(descriptor.name, descriptor.source);
            observer(index, &outcome);
            outcomes.push((index, outcome));
        }

        PoolRun {
            outcomes,
            peak_in_flight: peak.load(Ordering::SeqCst),
        }
    }
}

/// A poisoned queue mutex only means another worker panicked mid-claim;
/// the queue itself is still a plain VecDeque, so keep going.
fn lock_queue(
    queue: &Mutex<VecDeque<TaskDescriptor>>,
) -> std::sync::MutexGuard<'_, VecDeque<TaskDescriptor>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use crate::task::ResizePlan;
    use std::time::Duration;

    fn descriptors(count: usize) -> Vec<TaskDescriptor> {
        (0..count)
            .map(|index| TaskDescriptor {
                index,
                name: format!("t{}.png", index),
                source: PathBuf::from(format!("/in/t{}.png", index)),
                destination: PathBuf::from(format!("/out/t{}.png", index)),
                format: None,
                quality: 80,
                resize: ResizePlan::Keep,
                advisory: None,
            })
            .collect()
    }

    fn by_index(run: PoolRun) -> Vec<TaskOutcome> {
        let mut outcomes = run.outcomes;
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    #[tokio::test]
    async fn test_every_task_reported_exactly_once() {
        let run = WorkerPool::run(
            descriptors(9),
            3,
            CancelHandle::new(),
            |d| Ok(d.destination.clone()),
            |_, _| {},
        )
        .await;

        assert_eq!(run.outcomes.len(), 9);
        let mut indices: Vec<usize> = run.outcomes.iter().map(|(i, _)| *i).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_worker_count() {
        let gauge = Arc::new(AtomicUsize::new(0));
        let observed_peak = Arc::new(AtomicUsize::new(0));
        let op_gauge = Arc::clone(&gauge);
        let op_peak = Arc::clone(&observed_peak);

        let run = WorkerPool::run(
            descriptors(12),
            3,
            CancelHandle::new(),
            move |d| {
                let running = op_gauge.fetch_add(1, Ordering::SeqCst) + 1;
                op_peak.fetch_max(running, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                op_gauge.fetch_sub(1, Ordering::SeqCst);
                Ok(d.destination.clone())
            },
            |_, _| {},
        )
        .await;

        assert!(run.peak_in_flight <= 3);
        assert!(observed_peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(run.outcomes.len(), 12);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_pool() {
        let run = WorkerPool::run(
            descriptors(3),
            2,
            CancelHandle::new(),
            |d| {
                if d.index == 1 {
                    Err(ProcessError::SourceMissing(d.source.clone()))
                } else {
                    Ok(d.destination.clone())
                }
            },
            |_, _| {},
        )
        .await;

        let outcomes = by_index(run);
        assert_eq!(outcomes[0].status, TaskStatus::Succeeded);
        assert_eq!(outcomes[1].status, TaskStatus::Failed);
        assert_eq!(outcomes[1].error_kind, Some(ErrorKind::SourceMissing));
        assert_eq!(outcomes[2].status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_panic_confined_to_its_task() {
        let run = WorkerPool::run(
            descriptors(3),
            2,
            CancelHandle::new(),
            |d| {
                if d.index == 0 {
                    panic!("codec blew up");
                }
                Ok(d.destination.clone())
            },
            |_, _| {},
        )
        .await;

        let outcomes = by_index(run);
        assert_eq!(outcomes[0].status, TaskStatus::Failed);
        assert_eq!(outcomes[0].error_kind, Some(ErrorKind::Internal));
        assert_eq!(outcomes[1].status, TaskStatus::Succeeded);
        assert_eq!(outcomes[2].status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancellation_marks_unclaimed_tasks_cancelled() {
        let cancel = CancelHandle::new();
        let trigger = cancel.clone();

        let run = WorkerPool::run(
            descriptors(3),
            1,
            cancel,
            move |d| {
                // First task cancels the batch while it is still running.
                trigger.cancel();
                Ok(d.destination.clone())
            },
            |_, _| {},
        )
        .await;

        let outcomes = by_index(run);
        assert_eq!(outcomes[0].status, TaskStatus::Succeeded);
        assert_eq!(outcomes[1].status, TaskStatus::Cancelled);
        assert_eq!(outcomes[2].status, TaskStatus::Cancelled);
        assert!(outcomes[1].error_kind.is_none());
    }

    #[tokio::test]
    async fn test_resource_exhaustion_halts_claiming() {
        let run = WorkerPool::run(
            descriptors(3),
            1,
            CancelHandle::new(),
            |d| {
                if d.index == 0 {
                    Err(ProcessError::Resource(std::io::Error::new(
                        std::io::ErrorKind::StorageFull,
                        "no space left on device",
                    )))
                } else {
                    Ok(d.destination.clone())
                }
            },
            |_, _| {},
        )
        .await;

        let outcomes = by_index(run);
        assert_eq!(outcomes[0].status, TaskStatus::Failed);
        assert_eq!(outcomes[0].error_kind, Some(ErrorKind::Resource));
        assert_eq!(outcomes[1].status, TaskStatus::Cancelled);
        assert_eq!(outcomes[2].status, TaskStatus::Cancelled);
    }
}
