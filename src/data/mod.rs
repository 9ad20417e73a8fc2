// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From SQuAD JSON files to padded, sequence-major batches.
//
//   train / test .json
//       │
//       ▼
//   squad          → flat (id, question, context, answer) examples
//       │
//       ▼
//   preprocessor   → WordPiece ids, answer char → token alignment
//       │
//       ▼
//   QaDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   splitter       → seeded shuffle, train / validation split
//       │
//       ▼
//   QaBatcher      → per-batch padding into QaBatch
//       │
//       ▼
//   QaBatchSource  → train / val / test BatchSplits + vocabulary
//
// Nothing here touches tensors; the model layer converts
// batches at its boundary.

/// SQuAD JSON reader
pub mod squad;

/// Tokenisation, answer alignment and input assembly
pub mod preprocessor;

/// Implements Burn's Dataset trait for Q&A samples
pub mod dataset;

/// Pads samples into QaBatch values
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;

/// The three batched splits used by a run
pub mod source;
