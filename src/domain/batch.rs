// ============================================================
// Layer 3 — Batch Domain Types
// ============================================================
// Plain containers for what flows between the batch source,
// the model, and the scoring code:
//
//   TokenMatrix    — [seq_len × batch_size] token ids, stored
//                    sequence-major (position first)
//   QaBatch        — input ids + segment ids + gold spans
//   PaddingMask    — [batch_size × seq_len], true = padding
//   BatchSplit     — one restartable split (train/val/test)
//   PredictionPair — argmax start/end per example
//
// No framework types live here; the ml layer converts these
// into tensors at the model boundary.

use serde::{Deserialize, Serialize};

use crate::domain::error::BatchError;

// ─── Span ────────────────────────────────────────────────────────────────────
/// A (start, end) token-index pair, inclusive on both ends.
///
/// Model output is never forced to be valid: an inverted or
/// out-of-range span is carried as-is and decodes to empty or
/// truncated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end:   usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// `0 <= start <= end < seq_len`
    pub fn is_valid(&self, seq_len: usize) -> bool {
        self.start <= self.end && self.end < seq_len
    }
}

// ─── TokenMatrix ─────────────────────────────────────────────────────────────
/// Token ids shaped `[seq_len × batch_size]`.
/// `data[pos * batch_size + example]` holds the id at `pos` of `example`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatrix {
    seq_len:    usize,
    batch_size: usize,
    data:       Vec<u32>,
}

impl TokenMatrix {
    /// Build from per-example rows (all rows must share one length).
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self, BatchError> {
        let batch_size = rows.len();
        let seq_len    = rows.first().map_or(0, Vec::len);

        if let Some((example, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != seq_len) {
            return Err(BatchError::RaggedRow {
                example,
                expected: seq_len,
                actual:   row.len(),
            });
        }

        let mut data = Vec::with_capacity(seq_len * batch_size);
        for pos in 0..seq_len {
            data.extend(rows.iter().map(|row| row[pos]));
        }
        Ok(Self { seq_len, batch_size, data })
    }

    pub fn seq_len(&self) -> usize { self.seq_len }

    pub fn batch_size(&self) -> usize { self.batch_size }

    pub fn get(&self, pos: usize, example: usize) -> u32 {
        self.data[pos * self.batch_size + example]
    }

    /// Token ids of one example, in sequence order.
    pub fn row(&self, example: usize) -> Vec<u32> {
        (0..self.seq_len).map(|pos| self.get(pos, example)).collect()
    }

    /// Transpose into `[batch_size][seq_len]`.
    pub fn rows(&self) -> Vec<Vec<u32>> {
        (0..self.batch_size).map(|example| self.row(example)).collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.seq_len, self.batch_size)
    }
}

// ─── PaddingMask ─────────────────────────────────────────────────────────────
/// Attention mask shaped `[batch_size × seq_len]`.
/// `true` marks a position holding the padding index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddingMask {
    batch_size: usize,
    seq_len:    usize,
    data:       Vec<bool>,
}

impl PaddingMask {
    pub fn from_input_ids(input_ids: &TokenMatrix, pad_idx: u32) -> Self {
        let (seq_len, batch_size) = input_ids.shape();
        let data = (0..batch_size)
            .flat_map(|example| (0..seq_len).map(move |pos| (pos, example)))
            .map(|(pos, example)| input_ids.get(pos, example) == pad_idx)
            .collect();
        Self { batch_size, seq_len, data }
    }

    #[cfg(test)]
    pub fn is_padding(&self, example: usize, pos: usize) -> bool {
        self.data[example * self.seq_len + pos]
    }

    /// Batch-major flat view, ready to become a `[batch, seq]` tensor.
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    pub fn dims(&self) -> [usize; 2] {
        [self.batch_size, self.seq_len]
    }
}

// ─── QaBatch ─────────────────────────────────────────────────────────────────
/// One padded batch: `(input ids, segment ids, gold spans)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaBatch {
    /// `[seq_len × batch_size]`
    pub input_ids:   TokenMatrix,
    /// Same shape as `input_ids`; 0 = question part, 1 = context part
    pub segment_ids: TokenMatrix,
    /// One gold span per example (the `[batch_size × 2]` label matrix)
    pub labels:      Vec<Span>,
}

impl QaBatch {
    pub fn new(
        input_ids:   TokenMatrix,
        segment_ids: TokenMatrix,
        labels:      Vec<Span>,
    ) -> Result<Self, BatchError> {
        let (seq_len, batch_size) = input_ids.shape();
        let (seg_seq, seg_batch)  = segment_ids.shape();
        if (seg_seq, seg_batch) != (seq_len, batch_size) {
            return Err(BatchError::ShapeMismatch {
                what: "segment ids",
                seq_len,
                batch_size,
                actual_seq:   seg_seq,
                actual_batch: seg_batch,
            });
        }
        if labels.len() != batch_size {
            return Err(BatchError::LabelCount { labels: labels.len(), batch_size });
        }
        Ok(Self { input_ids, segment_ids, labels })
    }

    pub fn batch_size(&self) -> usize { self.input_ids.batch_size() }

    pub fn seq_len(&self) -> usize { self.input_ids.seq_len() }

    pub fn padding_mask(&self, pad_idx: u32) -> PaddingMask {
        PaddingMask::from_input_ids(&self.input_ids, pad_idx)
    }
}

// ─── BatchSplit ──────────────────────────────────────────────────────────────
/// A fully materialised split. Iteration order is fixed at
/// construction, so every call to `iter()` replays the same batches.
#[derive(Debug, Clone, Default)]
pub struct BatchSplit {
    batches:     Vec<QaBatch>,
    /// Example ids in batch order, flattened (may be empty)
    example_ids: Vec<String>,
}

impl BatchSplit {
    #[cfg(test)]
    pub fn new(batches: Vec<QaBatch>) -> Self {
        Self { batches, example_ids: Vec::new() }
    }

    pub fn with_example_ids(batches: Vec<QaBatch>, example_ids: Vec<String>) -> Self {
        Self { batches, example_ids }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QaBatch> {
        self.batches.iter()
    }

    /// Number of batches.
    pub fn len(&self) -> usize { self.batches.len() }

    pub fn is_empty(&self) -> bool { self.batches.is_empty() }

    pub fn first(&self) -> Option<&QaBatch> { self.batches.first() }

    pub fn num_examples(&self) -> usize {
        self.batches.iter().map(QaBatch::batch_size).sum()
    }

    pub fn example_ids(&self) -> &[String] { &self.example_ids }
}

// ─── PredictionPair ──────────────────────────────────────────────────────────
/// Predicted start and end index per example, kept as two
/// equal-length sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionPair {
    pub starts: Vec<usize>,
    pub ends:   Vec<usize>,
}

impl PredictionPair {
    #[cfg(test)]
    pub fn from_spans(spans: &[Span]) -> Self {
        Self {
            starts: spans.iter().map(|s| s.start).collect(),
            ends:   spans.iter().map(|s| s.end).collect(),
        }
    }

    /// Append another batch's predictions.
    pub fn extend(&mut self, other: PredictionPair) {
        self.starts.extend(other.starts);
        self.ends.extend(other.ends);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize { self.starts.len().min(self.ends.len()) }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn span(&self, i: usize) -> Option<Span> {
        Some(Span::new(*self.starts.get(i)?, *self.ends.get(i)?))
    }

    pub fn spans(&self) -> impl Iterator<Item = Span> + '_ {
        self.starts.iter().zip(&self.ends).map(|(&s, &e)| Span::new(s, e))
    }
}

// ─── Unit Tests ──────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_stores_sequence_major() {
        let m = TokenMatrix::from_rows(&[vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.get(0, 1), 4);
        assert_eq!(m.get(2, 0), 3);
        assert_eq!(m.rows(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = TokenMatrix::from_rows(&[vec![1, 2], vec![3]]).unwrap_err();
        assert_eq!(err, BatchError::RaggedRow { example: 1, expected: 2, actual: 1 });
    }

    #[test]
    fn test_padding_mask_marks_pad_positions() {
        let ids  = TokenMatrix::from_rows(&[vec![101, 7, 0], vec![101, 0, 0]]).unwrap();
        let mask = PaddingMask::from_input_ids(&ids, 0);
        assert_eq!(mask.dims(), [2, 3]);
        assert_eq!(mask.as_slice(), &[false, false, true, false, true, true]);
        assert!(mask.is_padding(1, 1));
        assert!(!mask.is_padding(0, 1));
    }

    #[test]
    fn test_batch_rejects_mismatched_segments_and_labels() {
        let ids  = TokenMatrix::from_rows(&[vec![1, 2], vec![3, 4]]).unwrap();
        let segs = TokenMatrix::from_rows(&[vec![0, 1]]).unwrap();
        assert!(matches!(
            QaBatch::new(ids.clone(), segs, vec![Span::default(); 2]),
            Err(BatchError::ShapeMismatch { what: "segment ids", .. })
        ));

        let segs = TokenMatrix::from_rows(&[vec![0, 1], vec![0, 1]]).unwrap();
        assert_eq!(
            QaBatch::new(ids, segs, vec![Span::default()]).unwrap_err(),
            BatchError::LabelCount { labels: 1, batch_size: 2 }
        );
    }

    #[test]
    fn test_span_validity() {
        assert!(Span::new(1, 2).is_valid(3));
        assert!(!Span::new(2, 1).is_valid(3));
        assert!(!Span::new(1, 3).is_valid(3));
    }

    #[test]
    fn test_prediction_pair_extend_and_span() {
        let mut p = PredictionPair::from_spans(&[Span::new(1, 2)]);
        p.extend(PredictionPair::from_spans(&[Span::new(3, 4)]));
        assert_eq!(p.len(), 2);
        assert_eq!(p.span(1), Some(Span::new(3, 4)));
        assert_eq!(p.span(2), None);
    }
}
