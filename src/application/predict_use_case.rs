// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Runs the best checkpoint over the test file:
//
//   Step 1: Take the architecture recorded with the checkpoint
//   Step 2: Load tokenizer + test split only
//   Step 3: Rebuild the encoder, load the checkpoint weights
//   Step 4: Inference-only evaluation pass (labels never read)
//   Step 5: Write predictions.json, log a qualitative sample
//
// predictions.json:
//   [ { "id": "...", "start": 42, "end": 44, "answer": "the mat" }, ... ]

use anyhow::{Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::config::{Device, RunConfig};
use crate::application::train_use_case::{build_model, check_tokenizer_fits};
use crate::data::source::QaBatchSource;
use crate::domain::batch::{BatchSplit, PredictionPair};
use crate::domain::vocab::VocabularyMapping;
use crate::infra::{checkpoint::CheckpointPolicy, tokenizer_store::TokenizerStore};
use crate::ml::{decoder, eval_loop};

pub const PREDICTIONS_FILE: &str = "predictions.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub id:     String,
    pub start:  usize,
    pub end:    usize,
    pub answer: String,
}

/// Pair every predicted span with its example id and answer text.
/// Predictions are in split order, the same order as `example_ids`.
pub fn collect_predictions(
    split:       &BatchSplit,
    vocab:       &VocabularyMapping,
    predictions: &PredictionPair,
) -> Vec<Prediction> {
    let rows = split.iter().flat_map(|batch| batch.input_ids.rows());

    split
        .example_ids()
        .iter()
        .zip(rows)
        .zip(predictions.spans())
        .map(|((id, row), span)| {
            let tokens: Vec<&str> = row.iter().map(|&t| vocab.token(t)).collect();
            Prediction {
                id:     id.clone(),
                start:  span.start,
                end:    span.end,
                answer: decoder::span_text(&tokens, span),
            }
        })
        .collect()
}

pub struct PredictUseCase {
    config: RunConfig,
    output: Option<PathBuf>,
}

impl PredictUseCase {
    /// `output` defaults to `<model_save_dir>/predictions.json`.
    pub fn new(config: RunConfig, output: Option<PathBuf>) -> Self {
        Self { config, output }
    }

    pub fn execute(self) -> Result<Vec<Prediction>> {
        match self.config.device {
            Device::Cpu  => self.run::<Autodiff<NdArray>>(&Default::default()),
            Device::Wgpu => self.run::<Autodiff<Wgpu>>(&WgpuDevice::default()),
        }
    }

    fn run<B: AutodiffBackend>(self, device: &B::Device) -> Result<Vec<Prediction>> {
        // ── Step 1: Architecture of the trained run ──────────────────────────
        let policy = CheckpointPolicy::new(&self.config.model_save_dir, false)?;
        let cfg = match policy.load_config()? {
            Some(trained) => self.config.with_trained_architecture(&trained),
            None          => self.config,
        };

        // ── Step 2: Test split only ──────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.pretrained_dir).load()?;
        let source = QaBatchSource::load_train_val_test_data(&tokenizer, &cfg.data_settings(), true)?;
        check_tokenizer_fits(&source, &cfg)?;

        // ── Step 3: Model ────────────────────────────────────────────────────
        let model = policy.load_for_inference(build_model::<B>(&cfg, device)?)?;

        // ── Step 4: Inference pass ───────────────────────────────────────────
        let outcome = eval_loop::evaluate(&source.test, &model, source.pad_idx(), true)?;

        // ── Step 5: Output ───────────────────────────────────────────────────
        let predictions = collect_predictions(&source.test, source.vocab(), &outcome.predictions);
        let path = self.output.unwrap_or_else(|| cfg.model_save_dir.join(PREDICTIONS_FILE));
        fs::write(&path, serde_json::to_string_pretty(&predictions)?)
            .with_context(|| format!("Cannot write predictions to '{}'", path.display()))?;
        tracing::info!("Wrote {} predictions to '{}'", predictions.len(), path.display());

        if let Some(first) = source.test.first() {
            decoder::render(&first.input_ids, source.vocab(), decoder::NUM_SHOW, &outcome.predictions, &first.labels);
        }
        Ok(predictions)
    }
}
