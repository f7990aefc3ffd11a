//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione ambientale dell'engine.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri di runtime dell'engine
//! - Fornisce validazione dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati
//!
//! I parametri della singola richiesta (task, destinazione, workers
//! richiesti) NON vivono qui: arrivano con `ProcessImagesOptions` e hanno
//! vita di batch. `Config` copre ciò che un host configura una volta al
//! processo: output JSON, timeout complessivo, tetto ai worker.
//!
//! ## Parametri di configurazione:
//! - `json_output`: Emette eventi JSON line-delimited su stdout (default: false)
//! - `batch_timeout_secs`: Timeout complessivo del batch; allo scadere agisce
//!   da trigger di cancellazione (default: None = nessun timeout)
//! - `max_workers`: Tetto alla concorrenza; default il parallelismo CPU
//!   rilevato

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Overall batch timeout in seconds (None = no timeout)
    pub batch_timeout_secs: Option<u64>,
    /// Ceiling for the worker count (None = detected CPU parallelism)
    pub max_workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            json_output: false,
            batch_timeout_secs: None,
            max_workers: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.batch_timeout_secs == Some(0) {
            return Err(anyhow::anyhow!("Batch timeout must be greater than zero"));
        }

        if self.max_workers == Some(0) {
            return Err(anyhow::anyhow!("Worker ceiling must be greater than zero"));
        }

        Ok(())
    }

    /// Upper bound for the coerced worker count (`N_max`).
    pub fn worker_ceiling(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
