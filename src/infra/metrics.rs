// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per finished epoch.
//
// Output file: <model_save_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_accuracy,epoch_secs,checkpoint_saved
//   0,3.124500,0.412000,81.20,true
//   1,2.890100,,79.85,false          ← no validation this epoch
//
// The file is appended to across runs, so a resumed run keeps
// the rows of the runs before it.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::trainer::{EpochReport, TrainingListener};

const HEADER: &str = "epoch,train_loss,val_accuracy,epoch_secs,checkpoint_saved";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based, as in the progress log
    pub epoch: usize,

    /// Mean loss over the epoch's training batches
    pub train_loss: f64,

    /// Exact-match span accuracy; `None` when validation did not run
    pub val_accuracy: Option<f64>,

    pub epoch_secs: f64,

    /// Whether this epoch overwrote the checkpoint
    pub checkpoint_saved: bool,
}

impl From<&EpochReport> for EpochMetrics {
    fn from(r: &EpochReport) -> Self {
        Self {
            epoch:            r.summary.epoch,
            train_loss:       r.summary.mean_loss,
            val_accuracy:     r.validation.as_ref().map(|v| v.accuracy),
            epoch_secs:       r.summary.duration.as_secs_f64(),
            checkpoint_saved: r.validation.as_ref().is_some_and(|v| v.decision.persisted()),
        }
    }
}

impl EpochMetrics {
    fn csv_row(&self) -> String {
        let val = self.val_accuracy.map(|a| format!("{a:.6}")).unwrap_or_default();
        format!(
            "{},{:.6},{},{:.2},{}",
            self.epoch, self.train_loss, val, self.epoch_secs, self.checkpoint_saved
        )
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_accuracy={:?}",
            m.epoch,
            m.train_loss,
            m.val_accuracy,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl TrainingListener for MetricsLogger {
    fn on_epoch_complete(&mut self, report: &EpochReport) -> Result<()> {
        self.log(&EpochMetrics::from(report))
    }
}
