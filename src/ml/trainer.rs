// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch/batch orchestration over the SpanModel + SpanOptimizer
// seams. Per batch:
//
//   padding mask → forward_train (loss, logits, grads)
//                → exactly one optimiser step
//
//   batch % 10  == 0 → progress record (loss, batch accuracy)
//   batch % 100 == 0 → qualitative sample of the current batch
//
// Per epoch: mean loss + wall-clock time, then (on the
// validation cadence) an EvalLoop pass over the validation
// split, a sample of its first batch, and the checkpoint
// decision.
//
// Errors are not caught anywhere in here: a failing batch
// aborts the run and nothing is checkpointed for that epoch.
// There is no mid-epoch resume.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::data::source::QaBatchSource;
use crate::domain::traits::{Checkpointable, SpanInput, SpanModel, SpanOptimizer, TrainOutput};
use crate::infra::checkpoint::{CheckpointDecision, CheckpointPolicy, CheckpointState};
use crate::ml::decoder::{self, DecodedSample, NUM_SHOW};
use crate::ml::eval_loop;
use crate::ml::scorer;

/// Progress record cadence, in batches.
pub const LOG_EVERY: usize = 10;
/// Qualitative sample cadence, in batches.
pub const SAMPLE_EVERY: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct TrainSettings {
    pub epochs:           usize,
    /// Validate after epochs where `(epoch + 1) % validation_every == 0`.
    /// 0 disables validation.
    pub validation_every: usize,
}

impl TrainSettings {
    pub fn validates_after(&self, epoch: usize) -> bool {
        (epoch + 1).checked_rem(self.validation_every) == Some(0)
    }
}

// ─── Records handed to listeners ─────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub epoch:       usize,
    pub batch:       usize,
    pub num_batches: usize,
    pub loss:        f64,
    pub accuracy:    f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch:     usize,
    /// NaN when the training split is empty
    pub mean_loss: f64,
    pub duration:  Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub epoch:    usize,
    pub accuracy: f64,
    pub decision: CheckpointDecision,
}

/// Everything known about an epoch once it is over.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub summary:    EpochSummary,
    pub validation: Option<ValidationReport>,
}

/// Where the loop's observable output goes. All hooks default to no-ops.
pub trait TrainingListener {
    fn on_progress(&mut self, _record: &ProgressRecord) -> Result<()> { Ok(()) }

    fn on_sample(&mut self, _samples: &[DecodedSample]) -> Result<()> { Ok(()) }

    fn on_epoch_end(&mut self, _summary: &EpochSummary) -> Result<()> { Ok(()) }

    fn on_validation(&mut self, _report: &ValidationReport) -> Result<()> { Ok(()) }

    /// After validation (if any) for the epoch has finished.
    fn on_epoch_complete(&mut self, _report: &EpochReport) -> Result<()> { Ok(()) }
}

/// Forwards every hook to both listeners, left first.
impl<A: TrainingListener, B: TrainingListener> TrainingListener for (A, B) {
    fn on_progress(&mut self, record: &ProgressRecord) -> Result<()> {
        self.0.on_progress(record)?;
        self.1.on_progress(record)
    }

    fn on_sample(&mut self, samples: &[DecodedSample]) -> Result<()> {
        self.0.on_sample(samples)?;
        self.1.on_sample(samples)
    }

    fn on_epoch_end(&mut self, summary: &EpochSummary) -> Result<()> {
        self.0.on_epoch_end(summary)?;
        self.1.on_epoch_end(summary)
    }

    fn on_validation(&mut self, report: &ValidationReport) -> Result<()> {
        self.0.on_validation(report)?;
        self.1.on_validation(report)
    }

    fn on_epoch_complete(&mut self, report: &EpochReport) -> Result<()> {
        self.0.on_epoch_complete(report)?;
        self.1.on_epoch_complete(report)
    }
}

/// Writes everything to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl TrainingListener for LogListener {
    fn on_progress(&mut self, r: &ProgressRecord) -> Result<()> {
        tracing::info!(
            "Epoch: {}, Batch[{}/{}], Train loss :{:.3}, Train acc: {:.3}",
            r.epoch, r.batch, r.num_batches, r.loss, r.accuracy,
        );
        Ok(())
    }

    fn on_sample(&mut self, samples: &[DecodedSample]) -> Result<()> {
        decoder::emit(samples, NUM_SHOW);
        Ok(())
    }

    fn on_epoch_end(&mut self, s: &EpochSummary) -> Result<()> {
        tracing::info!(
            "Epoch: {}, Train loss: {:.3}, Epoch time = {:.3}s",
            s.epoch, s.mean_loss, s.duration.as_secs_f64(),
        );
        Ok(())
    }

    fn on_validation(&mut self, r: &ValidationReport) -> Result<()> {
        match r.decision {
            CheckpointDecision::Persisted { previous_best } => tracing::info!(
                "Epoch: {}, Val acc: {:.3} (best was {:.3}), model saved",
                r.epoch, r.accuracy, previous_best,
            ),
            CheckpointDecision::Kept { best } => tracing::info!(
                "Epoch: {}, Val acc: {:.3} (best {:.3}), checkpoint unchanged",
                r.epoch, r.accuracy, best,
            ),
        }
        Ok(())
    }
}

// ─── TrainLoop ───────────────────────────────────────────────────────────────
/// Owns the optimiser for one session; the model is threaded through
/// `run` by value and handed back at the end.
pub struct TrainLoop<'a, O> {
    optimizer: O,
    source:    &'a QaBatchSource,
    policy:    &'a CheckpointPolicy,
    settings:  TrainSettings,
}

impl<'a, O> TrainLoop<'a, O> {
    pub fn new(
        optimizer: O,
        source:    &'a QaBatchSource,
        policy:    &'a CheckpointPolicy,
        settings:  TrainSettings,
    ) -> Self {
        Self { optimizer, source, policy, settings }
    }

    /// Run every epoch. Returns the final model and checkpoint state.
    pub fn run<M>(
        mut self,
        mut model: M,
        mut state: CheckpointState,
        listener:  &mut dyn TrainingListener,
    ) -> Result<(M, CheckpointState)>
    where
        M: SpanModel + Checkpointable,
        O: SpanOptimizer<M>,
    {
        for epoch in 0..self.settings.epochs {
            let (trained, summary) = self.train_epoch(model, epoch, listener)?;
            model = trained;
            listener.on_epoch_end(&summary)?;

            let validation = if self.settings.validates_after(epoch) {
                let (next, report) = self.validate(&model, epoch, state, listener)?;
                state = next;
                listener.on_validation(&report)?;
                Some(report)
            } else {
                None
            };

            listener.on_epoch_complete(&EpochReport { summary, validation })?;
        }

        tracing::info!("Training complete, best validation accuracy {:.4}", state.best_accuracy());
        Ok((model, state))
    }

    fn train_epoch<M>(
        &mut self,
        mut model: M,
        epoch:     usize,
        listener:  &mut dyn TrainingListener,
    ) -> Result<(M, EpochSummary)>
    where
        M: SpanModel,
        O: SpanOptimizer<M>,
    {
        let train       = &self.source.train;
        let pad_idx     = self.source.pad_idx();
        let num_batches = train.len();
        let start_time  = Instant::now();
        let mut losses  = 0.0f64;

        for (idx, batch) in train.iter().enumerate() {
            let mask  = batch.padding_mask(pad_idx);
            let input = SpanInput::from_batch(batch, &mask);

            let TrainOutput { loss, logits, gradients } = model.forward_train(&input, &batch.labels)?;
            logits.check_shape(batch)?;

            model   = self.optimizer.step(model, gradients);
            losses += loss;

            if idx % LOG_EVERY == 0 {
                listener.on_progress(&ProgressRecord {
                    epoch,
                    batch: idx,
                    num_batches,
                    loss,
                    accuracy: scorer::batch_accuracy(&logits, &batch.labels),
                })?;
            }

            if idx % SAMPLE_EVERY == 0 {
                let samples = decoder::decode(
                    &batch.input_ids,
                    self.source.vocab(),
                    NUM_SHOW,
                    &scorer::predict(&logits),
                    &batch.labels,
                );
                listener.on_sample(&samples)?;
            }
        }

        let mean_loss = if num_batches > 0 { losses / num_batches as f64 } else { f64::NAN };
        Ok((model, EpochSummary { epoch, mean_loss, duration: start_time.elapsed() }))
    }

    fn validate<M>(
        &self,
        model:    &M,
        epoch:    usize,
        state:    CheckpointState,
        listener: &mut dyn TrainingListener,
    ) -> Result<(CheckpointState, ValidationReport)>
    where
        M: SpanModel + Checkpointable,
    {
        let val      = &self.source.val;
        let outcome  = eval_loop::evaluate(val, model, self.source.pad_idx(), false)?;
        let accuracy = outcome.accuracy.unwrap_or(0.0);

        // Leading predictions line up with the first validation batch.
        if let Some(first) = val.first() {
            let samples = decoder::decode(
                &first.input_ids,
                self.source.vocab(),
                NUM_SHOW,
                &outcome.predictions,
                &first.labels,
            );
            listener.on_sample(&samples)?;
        }

        let (next, decision) = self.policy.after_validation(state, accuracy, epoch, model)?;
        Ok((next, ValidationReport { epoch, accuracy, decision }))
    }
}
