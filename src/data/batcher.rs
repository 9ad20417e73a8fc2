// ============================================================
// Layer 4 — Q&A Batcher
// ============================================================
// Stacks tokenised samples into padded QaBatch values.
//
// How batching works here:
//   Input:  N QaSamples of varying length
//   Output: QaBatch with [L × N] id and segment matrices,
//           L = longest sample in this batch
//
//   Shorter samples are right-padded with the padding index
//   (ids) and 0 (segments). Unlabelled samples get the (0, 0)
//   placeholder span.
//
// Splits are cut by burn's DataLoader (no shuffling) and
// materialised once, so every epoch replays the same batch order.
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder};

use crate::data::dataset::{QaDataset, QaSample};
use crate::domain::batch::{BatchSplit, QaBatch, Span, TokenMatrix};
use crate::domain::error::BatchError;

#[derive(Clone, Copy, Debug)]
pub struct QaBatcher {
    pad_idx: u32,
}

impl QaBatcher {
    pub fn new(pad_idx: u32) -> Self {
        Self { pad_idx }
    }

    /// Cut `samples` into consecutive batches of `batch_size` (the last
    /// one may be smaller). The loader never shuffles, so batch order
    /// and `example_ids` follow `samples`.
    pub fn split(&self, samples: Vec<QaSample>, batch_size: usize) -> Result<BatchSplit, BatchError> {
        let ids: Vec<String> = samples.iter().map(|s| s.id.clone()).collect();
        let loader = DataLoaderBuilder::new(*self)
            .batch_size(batch_size.max(1))
            .build(QaDataset::new(samples));

        let batches = loader.iter().collect::<Result<Vec<QaBatch>, BatchError>>()?;
        Ok(BatchSplit::with_example_ids(batches, ids))
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items) with each mini-batch of samples.
impl Batcher<QaSample, Result<QaBatch, BatchError>> for QaBatcher {
    /// Pad `items` to their common maximum length and stack them.
    fn batch(&self, items: Vec<QaSample>) -> Result<QaBatch, BatchError> {
        let seq_len = items.iter().map(|s| s.input_ids.len()).max().unwrap_or(0);

        let pad_row = |row: &[u32], fill: u32| -> Vec<u32> {
            let mut padded = row.to_vec();
            padded.resize(seq_len, fill);
            padded
        };

        let id_rows:  Vec<Vec<u32>> = items.iter().map(|s| pad_row(&s.input_ids, self.pad_idx)).collect();
        let seg_rows: Vec<Vec<u32>> = items.iter().map(|s| pad_row(&s.segment_ids, 0)).collect();
        let labels:   Vec<Span>     = items.iter().map(|s| s.span.unwrap_or_default()).collect();

        QaBatch::new(
            TokenMatrix::from_rows(&id_rows)?,
            TokenMatrix::from_rows(&seg_rows)?,
            labels,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, len: usize, span: Option<Span>) -> QaSample {
        QaSample {
            id:          id.into(),
            input_ids:   (1..=len as u32).collect(),
            segment_ids: vec![1; len],
            span,
        }
    }

    #[test]
    fn test_pads_to_longest_in_batch() {
        let batch = QaBatcher::new(0)
            .batch(vec![sample("a", 3, Some(Span::new(1, 2))), sample("b", 5, None)])
            .unwrap();
        assert_eq!(batch.input_ids.shape(), (5, 2));
        assert_eq!(batch.input_ids.row(0), vec![1, 2, 3, 0, 0]);
        assert_eq!(batch.segment_ids.row(0), vec![1, 1, 1, 0, 0]);
        assert_eq!(batch.labels, vec![Span::new(1, 2), Span::new(0, 0)]);
    }

    #[test]
    fn test_split_keeps_order_and_ids() {
        let samples = (0..5).map(|i| sample(&format!("q{i}"), 2 + i, None)).collect();
        let split   = QaBatcher::new(9).split(samples, 2).unwrap();
        assert_eq!(split.len(), 3);
        assert_eq!(split.num_examples(), 5);
        assert_eq!(split.example_ids(), &["q0", "q1", "q2", "q3", "q4"]);
        assert_eq!(split.iter().last().map(QaBatch::batch_size), Some(1));

        // each loader batch is padded to its own longest sample
        let widths: Vec<usize> = split.iter().map(QaBatch::seq_len).collect();
        assert_eq!(widths, vec![3, 5, 6]);
        let first = split.first().unwrap();
        assert_eq!(first.input_ids.row(0), vec![1, 2, 9]);
    }

    #[test]
    fn test_empty_dataset_gives_empty_split() {
        let split = QaBatcher::new(0).split(Vec::new(), 4).unwrap();
        assert!(split.is_empty());
    }
}
