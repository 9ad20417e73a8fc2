// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal
// (training or predicting).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No clap types here (the CLI converts its arguments)
//   - Only workflow coordination and backend selection
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Encoder + task configuration and their merge
pub mod config;

// The training workflow
pub mod train_use_case;

// The test-file prediction workflow
pub mod predict_use_case;
