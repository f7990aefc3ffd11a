//! # Image Batch Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione ambientale dell'engine e validazione
//! - `error`: Tipi di errore custom e classificazione per il report
//! - `model`: Contratto dati wire (richiesta, report, outcome)
//! - `task`: Validazione e normalizzazione dei task in descriptor
//! - `convert`: Operazione immagine (decode/resize/encode/scrittura atomica)
//! - `pool`: Worker pool a concorrenza fissa con cancellazione
//! - `report`: Accumulo outcome e report finale ordinato
//! - `coordinator`: Orchestratore del batch
//! - `file_manager`: Enumerazione immagini e utilità sui file
//! - `progress`: Progress tracking e statistiche
//! - `json_output`: Eventi JSON line-delimited per host esterni
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use image_batch_converter::{BatchCoordinator, Config, ProcessImagesOptions};
//!
//! let coordinator = BatchCoordinator::new(Config::default())?;
//! let report = coordinator.process(options).await?;
//! println!("{}/{} succeeded", report.succeeded, report.total);
//! ```

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod model;
pub mod pool;
pub mod progress;
pub mod report;
pub mod task;

pub use config::Config;
pub use coordinator::BatchCoordinator;
pub use error::ProcessError;
pub use model::{
    BatchReport, ErrorKind, FileInfo, ImageTask, ProcessImagesOptions, TaskOutcome, TaskStatus,
};
pub use pool::CancelHandle;
pub use task::TaskDescriptor;
