// ============================================================
// Layer 4 — Batch Source
// ============================================================
// Owns the three pre-batched splits and the vocabulary the
// rest of the run reads from.
//
//   train file ──► prepare (answer required) ──► shuffle? ──► split ─┬─► train
//                                                                    └─► val
//   test file  ──► prepare (answer optional) ─────────────────────────► test
//
// Everything is materialised once; training epochs replay
// the same batch order.

use anyhow::Result;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::data::{
    batcher::QaBatcher,
    preprocessor::{Preprocessor, SpecialTokens},
    splitter,
    squad::read_squad,
};
use crate::domain::{batch::BatchSplit, vocab::VocabularyMapping};
use crate::infra::tokenizer_store;

/// What the loader needs to know, lifted out of the run config.
#[derive(Debug, Clone)]
pub struct DataSettings {
    pub train_file:   PathBuf,
    pub test_file:    PathBuf,
    pub batch_size:   usize,
    pub max_seq_len:  usize,
    /// Fraction of the train file held out for validation
    pub val_fraction: f64,
    pub shuffle:      bool,
    pub seed:         u64,
}

pub struct QaBatchSource {
    pub train: BatchSplit,
    pub val:   BatchSplit,
    pub test:  BatchSplit,
    pad_idx:   u32,
    vocab:     VocabularyMapping,
}

impl QaBatchSource {
    pub fn from_parts(
        train:   BatchSplit,
        val:     BatchSplit,
        test:    BatchSplit,
        pad_idx: u32,
        vocab:   VocabularyMapping,
    ) -> Self {
        Self { train, val, test, pad_idx, vocab }
    }

    /// Read, tokenise and batch the SQuAD files. With `only_test` the
    /// train file is not touched and train/val stay empty.
    pub fn load_train_val_test_data(
        tokenizer: &Tokenizer,
        settings:  &DataSettings,
        only_test: bool,
    ) -> Result<Self> {
        let vocab   = tokenizer_store::vocabulary(tokenizer);
        let special = SpecialTokens::resolve(&vocab)?;
        let pre     = Preprocessor::new(tokenizer, special, settings.max_seq_len);
        let batcher = QaBatcher::new(special.pad);

        let (train, val) = if only_test {
            (BatchSplit::default(), BatchSplit::default())
        } else {
            let mut samples = pre.prepare_all(&read_squad(&settings.train_file)?, true)?;
            if settings.shuffle {
                samples = splitter::shuffled(samples, settings.seed);
            }
            let (train, val) = splitter::split_train_val(samples, 1.0 - settings.val_fraction);
            (
                batcher.split(train, settings.batch_size)?,
                batcher.split(val, settings.batch_size)?,
            )
        };

        let test_samples = pre.prepare_all(&read_squad(&settings.test_file)?, false)?;
        let test = batcher.split(test_samples, settings.batch_size)?;

        tracing::info!(
            "Batches: {} train ({} ex), {} val ({} ex), {} test ({} ex)",
            train.len(), train.num_examples(),
            val.len(),   val.num_examples(),
            test.len(),  test.num_examples(),
        );

        Ok(Self::from_parts(train, val, test, special.pad, vocab))
    }

    pub fn pad_idx(&self) -> u32 { self.pad_idx }

    pub fn vocab(&self) -> &VocabularyMapping { &self.vocab }
}
