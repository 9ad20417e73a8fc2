use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::batch::Span;

/// One tokenised (unpadded) sample.
/// Sequence format: [CLS] question [SEP] context [SEP]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaSample {
    pub id:          String,
    pub input_ids:   Vec<u32>,
    /// 0 for [CLS] question [SEP], 1 for context [SEP]
    pub segment_ids: Vec<u32>,
    /// Absolute token span of the answer; `None` for unlabelled test samples
    pub span:        Option<Span>,
}

#[cfg(test)]
impl QaSample {
    pub fn answer_ids(&self) -> &[u32] {
        match self.span {
            Some(s) if s.is_valid(self.input_ids.len()) => &self.input_ids[s.start..=s.end],
            _ => &[],
        }
    }
}

pub struct QaDataset {
    samples: Vec<QaSample>,
}

impl QaDataset {
    pub fn new(samples: Vec<QaSample>) -> Self { Self { samples } }
}

impl Dataset<QaSample> for QaDataset {
    fn get(&self, index: usize) -> Option<QaSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
