// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Log + save the merged config   (Layer 6 - infra)
//   Step 2: Load the tokenizer             (Layer 6 - infra)
//   Step 3: Build train / val / test       (Layer 4 - data)
//   Step 4: Build the encoder              (Layer 5 - ml)
//   Step 5: Resume from checkpoint         (Layer 6 - infra)
//   Step 6: Run the training loop          (Layer 5 - ml)
//
// The backend is picked once, from `device`, and everything
// below is generic over it.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::config::{Device, RunConfig};
use crate::data::source::QaBatchSource;
use crate::domain::traits::Checkpointable;
use crate::infra::{
    checkpoint::CheckpointPolicy,
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::{adam, QaModel},
    trainer::{LogListener, TrainLoop},
};

/// Initial weights looked up under the pretrained directory.
pub const PRETRAINED_WEIGHTS_STEM: &str = "model";

/// Build the encoder from the config and load initial weights from
/// `<pretrained_dir>/model.mpk` when that file exists.
pub fn build_model<B: Backend>(cfg: &RunConfig, device: &B::Device) -> Result<QaModel<B>> {
    let model = cfg.model_config().init::<B>(device);
    let base  = cfg.pretrained_dir.join(PRETRAINED_WEIGHTS_STEM);
    if base.with_extension(QaModel::<B>::EXTENSION).exists() {
        tracing::info!("Loading initial weights from '{}'", cfg.pretrained_dir.display());
        return model.load_weights(&base);
    }
    tracing::warn!(
        "No initial weights under '{}', encoder starts from random initialisation",
        cfg.pretrained_dir.display()
    );
    Ok(model)
}

/// The tokenizer must not produce ids the embedding table cannot hold,
/// and its `[PAD]` id must be the one the encoder was trained with.
pub fn check_tokenizer_fits(source: &QaBatchSource, cfg: &RunConfig) -> Result<()> {
    if source.vocab().len() > cfg.encoder.vocab_size {
        bail!(
            "Tokenizer has {} entries but the encoder vocab_size is {}",
            source.vocab().len(),
            cfg.encoder.vocab_size
        );
    }
    if source.pad_idx() != cfg.encoder.pad_token_id {
        bail!(
            "Tokenizer maps [PAD] to {} but the encoder pad_token_id is {}",
            source.pad_idx(),
            cfg.encoder.pad_token_id
        );
    }
    Ok(())
}

pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        match self.config.device {
            Device::Cpu  => self.run::<Autodiff<NdArray>>(&Default::default()),
            Device::Wgpu => self.run::<Autodiff<Wgpu>>(&WgpuDevice::default()),
        }
    }

    fn run<B: AutodiffBackend>(&self, device: &B::Device) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Config ───────────────────────────────────────────────────
        cfg.log_fields()?;
        let policy = CheckpointPolicy::new(&cfg.model_save_dir, cfg.restore_best_accuracy)?;
        policy.save_config(cfg)?;

        // ── Step 2: Tokenizer ────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.pretrained_dir).load()?;

        // ── Step 3: Batches ──────────────────────────────────────────────────
        let source = QaBatchSource::load_train_val_test_data(&tokenizer, &cfg.data_settings(), false)?;
        check_tokenizer_fits(&source, cfg)?;
        if source.train.is_empty() {
            tracing::warn!("Training split is empty; every epoch loss will be NaN");
        }

        // ── Step 4 + 5: Model, resumed if a checkpoint exists ────────────────
        let model = build_model::<B>(cfg, device)?;
        let (model, state) = policy.resume(model)?;

        // ── Step 6: Train ────────────────────────────────────────────────────
        let mut listeners = (LogListener, MetricsLogger::new(&cfg.model_save_dir)?);
        let (_, state) = TrainLoop::new(adam::<B>(cfg.learning_rate), &source, &policy, cfg.train_settings())
            .run(model, state, &mut listeners)?;

        if state.has_checkpoint() {
            tracing::info!("Best checkpoint: '{}'", policy.artifact_path::<QaModel<B>>().display());
        } else {
            tracing::warn!("No validation pass improved on the start; nothing was saved");
        }
        Ok(())
    }
}
