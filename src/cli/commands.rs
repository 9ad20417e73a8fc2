// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags. Every flag can also be
// set through a SQUAD_QA_* environment variable.
//
// Architecture (hidden size, layers, ...) is not a flag: it
// comes from <pretrained_dir>/config.json.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::{Device, TaskConfig};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune the span encoder on a SQuAD training file
    Train(TrainArgs),

    /// Answer every question of the test file with the best checkpoint
    Predict(PredictArgs),
}

/// Flags shared by both commands.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// SQuAD-format test file
    #[arg(long, env = "SQUAD_QA_TEST_FILE", default_value = "data/SQuAD/test1.json")]
    pub test_file: PathBuf,

    /// Directory with config.json, tokenizer.json (or vocab.txt) and optional initial weights
    #[arg(long, env = "SQUAD_QA_PRETRAINED_DIR", default_value = "bert_base_uncased_english")]
    pub pretrained_dir: PathBuf,

    /// Where the checkpoint, its metadata, run_config.json and metrics.csv live
    #[arg(long, env = "SQUAD_QA_MODEL_SAVE_DIR", default_value = "cache")]
    pub model_save_dir: PathBuf,

    /// Number of samples processed together in one forward pass
    #[arg(long, env = "SQUAD_QA_BATCH_SIZE", default_value_t = 16)]
    pub batch_size: usize,

    /// Maximum tokens per input; defaults to max_position_embeddings
    #[arg(long, env = "SQUAD_QA_MAX_SEQ_LEN")]
    pub max_seq_len: Option<usize>,

    /// cpu (ndarray) or wgpu
    #[arg(long, env = "SQUAD_QA_DEVICE", default_value = "cpu")]
    pub device: Device,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// SQuAD-format training file (validation is carved from it)
    #[arg(long, env = "SQUAD_QA_TRAIN_FILE", default_value = "data/SQuAD/train1.json")]
    pub train_file: PathBuf,

    /// Adam learning rate
    #[arg(long, env = "SQUAD_QA_LEARNING_RATE", default_value_t = 5e-5)]
    pub learning_rate: f64,

    /// Number of full passes through the training data
    #[arg(long, env = "SQUAD_QA_EPOCHS", default_value_t = 3)]
    pub epochs: usize,

    /// Validate after every N-th epoch (0 = never)
    #[arg(long, env = "SQUAD_QA_VALIDATION_EVERY", default_value_t = 1)]
    pub validation_every: usize,

    /// Fraction of the training file held out for validation
    #[arg(long, env = "SQUAD_QA_VAL_FRACTION", default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Shuffle training samples once at load
    #[arg(long, env = "SQUAD_QA_SHUFFLE", default_value_t = true, action = clap::ArgAction::Set)]
    pub shuffle: bool,

    /// Seed for the shuffle
    #[arg(long, env = "SQUAD_QA_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Seed the best-accuracy tracker from the saved checkpoint metadata
    /// instead of starting from zero on resume
    #[arg(long, env = "SQUAD_QA_RESTORE_BEST_ACCURACY")]
    pub restore_best_accuracy: bool,
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output file; defaults to <model_save_dir>/predictions.json
    #[arg(long, env = "SQUAD_QA_OUTPUT")]
    pub output: Option<PathBuf>,
}

fn task_from_common(c: CommonArgs) -> TaskConfig {
    TaskConfig {
        test_file:      c.test_file,
        pretrained_dir: c.pretrained_dir,
        model_save_dir: c.model_save_dir,
        batch_size:     c.batch_size,
        max_seq_len:    c.max_seq_len,
        device:         c.device,
        ..TaskConfig::default()
    }
}

/// Convert CLI TrainArgs into the application-layer TaskConfig.
/// This is the boundary between Layer 1 and Layer 2;
/// the application layer never sees clap types.
impl From<TrainArgs> for TaskConfig {
    fn from(a: TrainArgs) -> Self {
        TaskConfig {
            train_file:            a.train_file,
            learning_rate:         a.learning_rate,
            epochs:                a.epochs,
            validation_every:      a.validation_every,
            val_fraction:          a.val_fraction,
            shuffle:               a.shuffle,
            seed:                  a.seed,
            restore_best_accuracy: a.restore_best_accuracy,
            ..task_from_common(a.common)
        }
    }
}

impl From<&PredictArgs> for TaskConfig {
    fn from(a: &PredictArgs) -> Self {
        task_from_common(a.common.clone())
    }
}
