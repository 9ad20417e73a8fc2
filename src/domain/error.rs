// ============================================================
// Layer 3 — Batch Errors
// ============================================================
// Typed failures for malformed batches. These are fatal per
// batch: the loops propagate them with `?` and the run aborts
// without taking a partial-epoch checkpoint.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    /// Per-example rows of different lengths.
    #[error("ragged batch: example {example} has {actual} tokens, expected {expected}")]
    RaggedRow {
        example:  usize,
        expected: usize,
        actual:   usize,
    },

    /// Segment ids (or position ids) disagree with the input ids.
    #[error("{what} shaped [{actual_seq} x {actual_batch}], input ids shaped [{seq_len} x {batch_size}]")]
    ShapeMismatch {
        what:         &'static str,
        seq_len:      usize,
        batch_size:   usize,
        actual_seq:   usize,
        actual_batch: usize,
    },

    #[error("{labels} labels for a batch of {batch_size} examples")]
    LabelCount { labels: usize, batch_size: usize },

    /// Model returned logits that do not cover the batch.
    #[error("model returned {rows} logit rows of width {width}, batch is [{seq_len} x {batch_size}]")]
    LogitShape {
        rows:       usize,
        width:      usize,
        seq_len:    usize,
        batch_size: usize,
    },
}
