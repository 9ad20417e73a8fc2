// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs      — CheckpointPolicy: resume, persist on
//                        strict improvement, metadata sidecar,
//                        run_config.json
//
//   tokenizer_store.rs — loads the pretrained tokenizer.json
//                        and derives the vocabulary table
//
//   metrics.rs         — per-epoch CSV rows, fed as a
//                        TrainingListener
//
//   logging.rs         — tracing subscriber: stdout + daily
//                        rolling file
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Pretrained tokenizer loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Subscriber setup for stdout and file logs
pub mod logging;
