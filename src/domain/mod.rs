// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums, and traits describing what the
// system works with: batches, spans, predictions, the
// vocabulary, and the model/optimiser/checkpoint seams.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Token matrices, batches, splits, spans, predictions
pub mod batch;

// Typed errors for malformed batches
pub mod error;

// Index-to-token lookup used for decoding
pub mod vocab;

// Model, optimiser, and checkpoint abstractions
pub mod traits;
