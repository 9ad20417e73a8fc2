// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// Only model.rs imports burn tensors. Everything else here
// works on host values through the domain traits, so the
// loops are testable against scripted models without a GPU.
//
//   model.rs     — burn encoder, SpanModel / SpanInference /
//                  Checkpointable impls, Adam adaptor
//   scorer.rs    — host argmax, span accuracy
//   eval_loop.rs — gradient-free pass over a split
//   decoder.rs   — token ids → readable answers for logging
//   trainer.rs   — epochs, progress cadence, validation,
//                  checkpoint hand-off
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Devlin et al. (2019) BERT

/// BERT-style span encoder
pub mod model;

/// Argmax and accuracy
pub mod scorer;

/// Evaluation over one split
pub mod eval_loop;

/// Qualitative answer decoding
pub mod decoder;

/// Training loop with validation and checkpointing
pub mod trainer;

#[cfg(test)]
pub mod testing;
