// ============================================================
// Layer 5 — Evaluation Loop
// ============================================================
// Runs the model over one full split without gradients.
//
//   - one inference view for the whole pass, dropped on every
//     exit path (normal return, `?` error, empty split)
//   - the split is iterated once, in order
//   - argmax start/end of every batch is appended to the
//     prediction list
//   - unless `inference_only`, start and end exact matches are
//     counted separately and averaged into one accuracy
//
// With `inference_only` the gold labels are never read, so test
// splits without answers are fine.

use anyhow::Result;

use crate::domain::batch::{BatchSplit, PredictionPair};
use crate::domain::traits::{SpanInference, SpanInput, SpanModel};
use crate::ml::scorer::{self, AccuracyRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    /// `None` for inference-only passes
    pub accuracy:    Option<f64>,
    pub predictions: PredictionPair,
}

pub fn evaluate<M: SpanModel>(
    split:          &BatchSplit,
    model:          &M,
    pad_idx:        u32,
    inference_only: bool,
) -> Result<EvalOutcome> {
    let view = model.inference();

    let mut record      = AccuracyRecord::default();
    let mut predictions = PredictionPair::default();

    for batch in split.iter() {
        let mask   = batch.padding_mask(pad_idx);
        let logits = view.forward_infer(&SpanInput::from_batch(batch, &mask))?;
        logits.check_shape(batch)?;

        let batch_pred = scorer::predict(&logits);
        if !inference_only {
            record.record(&batch_pred, &batch.labels);
        }
        predictions.extend(batch_pred);
    }

    let accuracy = (!inference_only).then(|| record.mean());
    if let Some(acc) = accuracy {
        tracing::debug!(
            "Evaluated {} examples: {} start / {} end matches, accuracy {:.4}",
            record.examples,
            record.start_matches,
            record.end_matches,
            acc,
        );
    }

    Ok(EvalOutcome { accuracy, predictions })
}

// ─── Unit Tests ──────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::Span;
    use crate::ml::testing::{uniform_batch, ScriptedModel};

    const PAD: u32 = 9;

    fn gold() -> Vec<Span> {
        (0..5).map(|_| Span::new(1, 3)).collect()
    }

    fn two_batch_split() -> BatchSplit {
        BatchSplit::new(vec![uniform_batch(5, gold()), uniform_batch(5, gold())])
    }

    #[test]
    fn test_all_correct_is_one() {
        let model = ScriptedModel::new();
        model.push_prediction(gold());
        model.push_prediction(gold());

        let out = evaluate(&two_batch_split(), &model, PAD, false).unwrap();
        assert_eq!(out.accuracy, Some(1.0));
        assert_eq!(out.predictions.len(), 10);
    }

    #[test]
    fn test_all_wrong_is_zero() {
        let model = ScriptedModel::new();
        model.push_prediction(vec![Span::new(0, 2); 5]);
        model.push_prediction(vec![Span::new(2, 0); 5]);

        let out = evaluate(&two_batch_split(), &model, PAD, false).unwrap();
        assert_eq!(out.accuracy, Some(0.0));
    }

    #[test]
    fn test_half_starts_right_all_ends_right() {
        // batch 1: every start right; batch 2: every start wrong
        let model = ScriptedModel::new();
        model.push_prediction(gold());
        model.push_prediction(vec![Span::new(2, 3); 5]);

        let out = evaluate(&two_batch_split(), &model, PAD, false).unwrap();
        assert_eq!(out.accuracy, Some(0.75));
    }

    #[test]
    fn test_predictions_keep_split_order() {
        let model = ScriptedModel::new();
        model.push_prediction(vec![Span::new(0, 1); 5]);
        model.push_prediction(vec![Span::new(2, 3); 5]);

        let out = evaluate(&two_batch_split(), &model, PAD, true).unwrap();
        assert_eq!(out.accuracy, None);
        assert_eq!(out.predictions.starts, [vec![0; 5], vec![2; 5]].concat());
        assert_eq!(out.predictions.ends, [vec![1; 5], vec![3; 5]].concat());
    }

    #[test]
    fn test_view_released_after_empty_inference_pass() {
        let model = ScriptedModel::new();
        let out   = evaluate(&BatchSplit::default(), &model, PAD, true).unwrap();
        assert!(out.predictions.is_empty());
        assert_eq!(model.live_views(), 0);
    }

    #[test]
    fn test_empty_split_scores_zero() {
        let model = ScriptedModel::new();
        let out   = evaluate(&BatchSplit::default(), &model, PAD, false).unwrap();
        assert_eq!(out.accuracy, Some(0.0));
    }

    #[test]
    fn test_view_released_after_error() {
        // scripted logits for 3 examples against a batch of 5 → shape error
        let model = ScriptedModel::new();
        model.push_prediction(vec![Span::new(1, 3); 3]);

        assert!(evaluate(&two_batch_split(), &model, PAD, false).is_err());
        assert_eq!(model.live_views(), 0);
    }
}
