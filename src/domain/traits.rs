// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training and evaluation loops only talk to the model,
// the optimiser, and the checkpoint store through these traits.
//
// Implementations:
//   - QaModel<B: AutodiffBackend>   → SpanModel, Checkpointable
//   - QaModel<B: Backend>           → SpanInference
//   - AdamStep<O>                   → SpanOptimizer
//   - scripted mocks (ml::testing)  → all of the above, for tests
//
// Training and inference are two entry points with disjoint
// signatures. There is no train/eval mode flag: inference goes
// through a separate view value obtained from `SpanModel::inference`,
// and the training model is never switched out of training mode.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::Path;

use anyhow::Result;

use crate::domain::batch::{PaddingMask, QaBatch, Span, TokenMatrix};
use crate::domain::error::BatchError;

// ─── SpanInput ───────────────────────────────────────────────────────────────
/// Named inputs of one forward call.
#[derive(Debug, Clone, Copy)]
pub struct SpanInput<'a> {
    /// `[seq_len × batch_size]`
    pub input_ids:      &'a TokenMatrix,
    /// `[batch_size × seq_len]`, true = padding
    pub attention_mask: &'a PaddingMask,
    /// Segment ids, same shape as `input_ids`
    pub token_type_ids: &'a TokenMatrix,
    /// `None` = positions 0..seq_len
    pub position_ids:   Option<&'a TokenMatrix>,
}

impl<'a> SpanInput<'a> {
    pub fn from_batch(batch: &'a QaBatch, attention_mask: &'a PaddingMask) -> Self {
        Self {
            input_ids:      &batch.input_ids,
            attention_mask,
            token_type_ids: &batch.segment_ids,
            position_ids:   None,
        }
    }
}

// ─── SpanLogits ──────────────────────────────────────────────────────────────
/// Per-token start and end logits, one row of `seq_len` values per example.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanLogits {
    pub start: Vec<Vec<f32>>,
    pub end:   Vec<Vec<f32>>,
}

impl SpanLogits {
    /// The logits must hold exactly one full-width row per example.
    pub fn check_shape(&self, batch: &QaBatch) -> Result<(), BatchError> {
        let (seq_len, batch_size) = batch.input_ids.shape();
        for rows in [&self.start, &self.end] {
            let bad_width = rows.iter().find(|r| r.len() != seq_len);
            if rows.len() != batch_size || bad_width.is_some() {
                return Err(BatchError::LogitShape {
                    rows:  rows.len(),
                    width: bad_width.map_or(seq_len, Vec::len),
                    seq_len,
                    batch_size,
                });
            }
        }
        Ok(())
    }
}

/// What the training entry point hands back for one batch.
pub struct TrainOutput<G> {
    pub loss:      f64,
    pub logits:    SpanLogits,
    pub gradients: G,
}

// ─── SpanInference ───────────────────────────────────────────────────────────
/// Inference entry point: no gold positions, no loss, no gradients.
pub trait SpanInference {
    fn forward_infer(&self, input: &SpanInput<'_>) -> Result<SpanLogits>;
}

// ─── SpanModel ───────────────────────────────────────────────────────────────
/// Training entry point plus access to an inference view.
pub trait SpanModel: Sized {
    /// Gradients produced by one backward pass, consumed by the optimiser.
    type Gradients;

    /// Gradient-free view used by evaluation. Dropping it ends inference.
    type Inference: SpanInference;

    /// Forward + backward for one batch with gold start/end indices.
    fn forward_train(
        &self,
        input: &SpanInput<'_>,
        gold:  &[Span],
    ) -> Result<TrainOutput<Self::Gradients>>;

    fn inference(&self) -> Self::Inference;
}

// ─── SpanOptimizer ───────────────────────────────────────────────────────────
/// One parameter update. Takes the model by value and returns the
/// updated model, the way burn's optimisers do.
pub trait SpanOptimizer<M: SpanModel> {
    fn step(&mut self, model: M, gradients: M::Gradients) -> M;
}

// ─── Checkpointable ──────────────────────────────────────────────────────────
/// Any model whose full parameter state can be saved and restored.
///
/// `base` is the artifact path without extension; implementations
/// write to `base.<EXTENSION>`.
pub trait Checkpointable: Sized {
    const EXTENSION: &'static str;

    fn save_weights(&self, base: &Path) -> Result<()>;

    /// Returns the model with the stored parameters loaded.
    fn load_weights(self, base: &Path) -> Result<Self>;
}
