// ============================================================
// Layer 5 — Span Scorer
// ============================================================
// Exact-match accuracy over start/end logits. Pure functions,
// no state: used for the instantaneous accuracy in training
// progress records and (through AccuracyRecord) for the
// validation metric.
//
// Start and end are scored independently and averaged:
//   accuracy = (start_matches + end_matches) / (2 × examples)
//
// Argmax runs on the host so ties always resolve to the lowest
// index, whatever the backend does.

use crate::domain::batch::{PredictionPair, Span};
use crate::domain::traits::SpanLogits;

/// Index of the largest value; the first one wins on ties.
/// An empty row yields 0.
pub fn argmax(row: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best     = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best {
            best     = v;
            best_idx = i;
        }
    }
    best_idx
}

/// Argmax start and end per example.
pub fn predict(logits: &SpanLogits) -> PredictionPair {
    PredictionPair {
        starts: logits.start.iter().map(|r| argmax(r)).collect(),
        ends:   logits.end.iter().map(|r| argmax(r)).collect(),
    }
}

/// Exact-match accuracy of one batch, in `[0, 1]`.
pub fn batch_accuracy(logits: &SpanLogits, gold: &[Span]) -> f64 {
    let mut record = AccuracyRecord::default();
    record.record(&predict(logits), gold);
    record.mean()
}

// ─── AccuracyRecord ──────────────────────────────────────────────────────────
/// Running match counts over one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccuracyRecord {
    pub start_matches: usize,
    pub end_matches:   usize,
    pub examples:      usize,
}

impl AccuracyRecord {
    /// Add one batch. Examples beyond the shorter of the two inputs
    /// are not scored.
    pub fn record(&mut self, predicted: &PredictionPair, gold: &[Span]) {
        for (pred, gold) in predicted.spans().zip(gold) {
            self.start_matches += usize::from(pred.start == gold.start);
            self.end_matches   += usize::from(pred.end == gold.end);
            self.examples      += 1;
        }
    }

    /// 0.0 when nothing has been scored.
    pub fn mean(&self) -> f64 {
        if self.examples == 0 {
            return 0.0;
        }
        (self.start_matches + self.end_matches) as f64 / (2 * self.examples) as f64
    }
}
