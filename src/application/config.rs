// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Two sources, one merged value:
//
//   EncoderConfig  ← <pretrained_dir>/config.json  (architecture)
//   TaskConfig     ← CLI flags                     (paths, schedule)
//           │
//           ▼
//   RunConfig::merge(task, encoder)
//
// Precedence:
//   1. architecture fields always come from the encoder config
//   2. max_seq_len comes from the task when given, clamped to
//      max_position_embeddings; otherwise max_position_embeddings
//   3. everything else comes from the task
//
// The application layer never sees clap types; the CLI converts
// its arguments into TaskConfig.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::{Path, PathBuf}, str::FromStr};

use crate::data::source::DataSettings;
use crate::ml::model::QaModelConfig;
use crate::ml::trainer::TrainSettings;

pub const ENCODER_CONFIG_FILE: &str = "config.json";

// ─── Device ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// burn-ndarray on the host
    #[default]
    Cpu,
    /// burn-wgpu on the default adapter
    Wgpu,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" | "ndarray" => Ok(Device::Cpu),
            "wgpu" | "gpu"    => Ok(Device::Wgpu),
            other => Err(format!("unknown device '{other}' (expected 'cpu' or 'wgpu')")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Device::Cpu  => "cpu",
            Device::Wgpu => "wgpu",
        })
    }
}

// ─── EncoderConfig ───────────────────────────────────────────────────────────
/// BERT `config.json`. Absent fields take BERT-base values; unknown
/// fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub vocab_size:              usize,
    pub hidden_size:             usize,
    pub num_hidden_layers:       usize,
    pub num_attention_heads:     usize,
    pub intermediate_size:       usize,
    pub hidden_dropout_prob:     f64,
    pub max_position_embeddings: usize,
    pub type_vocab_size:         usize,
    pub pad_token_id:            u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            vocab_size:              30522,
            hidden_size:             768,
            num_hidden_layers:       12,
            num_attention_heads:     12,
            intermediate_size:       3072,
            hidden_dropout_prob:     0.1,
            max_position_embeddings: 512,
            type_vocab_size:         2,
            pad_token_id:            0,
        }
    }
}

impl EncoderConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read encoder config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed encoder config '{}'", path.display()))
    }

    pub fn load(pretrained_dir: &Path) -> Result<Self> {
        Self::from_json_file(&pretrained_dir.join(ENCODER_CONFIG_FILE))
    }
}

// ─── TaskConfig ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub train_file:            PathBuf,
    pub test_file:             PathBuf,
    pub pretrained_dir:        PathBuf,
    pub model_save_dir:        PathBuf,
    pub batch_size:            usize,
    /// `None` = use max_position_embeddings
    pub max_seq_len:           Option<usize>,
    pub learning_rate:         f64,
    pub epochs:                usize,
    /// Validate after every N-th epoch; 0 disables validation
    pub validation_every:      usize,
    pub val_fraction:          f64,
    pub shuffle:               bool,
    pub seed:                  u64,
    pub device:                Device,
    pub restore_best_accuracy: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            train_file:            PathBuf::from("data/SQuAD/train1.json"),
            test_file:             PathBuf::from("data/SQuAD/test1.json"),
            pretrained_dir:        PathBuf::from("bert_base_uncased_english"),
            model_save_dir:        PathBuf::from("cache"),
            batch_size:            16,
            max_seq_len:           None,
            learning_rate:         5e-5,
            epochs:                3,
            validation_every:      1,
            val_fraction:          0.1,
            shuffle:               true,
            seed:                  42,
            device:                Device::Cpu,
            restore_best_accuracy: false,
        }
    }
}

// ─── RunConfig ───────────────────────────────────────────────────────────────
/// The merged configuration of one run; saved as run_config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub train_file:            PathBuf,
    pub test_file:             PathBuf,
    pub pretrained_dir:        PathBuf,
    pub model_save_dir:        PathBuf,
    pub batch_size:            usize,
    pub max_seq_len:           usize,
    pub learning_rate:         f64,
    pub epochs:                usize,
    pub validation_every:      usize,
    pub val_fraction:          f64,
    pub shuffle:               bool,
    pub seed:                  u64,
    pub device:                Device,
    pub restore_best_accuracy: bool,
    pub encoder:               EncoderConfig,
}

impl RunConfig {
    pub fn merge(task: TaskConfig, encoder: EncoderConfig) -> Self {
        let limit = encoder.max_position_embeddings;
        let max_seq_len = match task.max_seq_len {
            Some(n) if n > limit => {
                tracing::warn!("max_seq_len {n} clamped to max_position_embeddings {limit}");
                limit
            }
            Some(n) => n,
            None    => limit,
        };

        Self {
            train_file:            task.train_file,
            test_file:             task.test_file,
            pretrained_dir:        task.pretrained_dir,
            model_save_dir:        task.model_save_dir,
            batch_size:            task.batch_size,
            max_seq_len,
            learning_rate:         task.learning_rate,
            epochs:                task.epochs,
            validation_every:      task.validation_every,
            val_fraction:          task.val_fraction,
            shuffle:               task.shuffle,
            seed:                  task.seed,
            device:                task.device,
            restore_best_accuracy: task.restore_best_accuracy,
            encoder,
        }
    }

    /// Keep the architecture and sequence length a checkpoint was trained
    /// with, so the stored weights fit the rebuilt model.
    pub fn with_trained_architecture(mut self, trained: &RunConfig) -> Self {
        if self.encoder != trained.encoder || self.max_seq_len != trained.max_seq_len {
            tracing::info!("Using the architecture recorded with the checkpoint");
        }
        self.encoder     = trained.encoder.clone();
        self.max_seq_len = trained.max_seq_len;
        self
    }

    pub fn model_config(&self) -> QaModelConfig {
        let e = &self.encoder;
        QaModelConfig::new(
            e.vocab_size,
            e.type_vocab_size,
            e.max_position_embeddings,
            e.hidden_size,
            e.num_attention_heads,
            e.num_hidden_layers,
            e.intermediate_size,
            e.hidden_dropout_prob,
        )
    }

    pub fn data_settings(&self) -> DataSettings {
        DataSettings {
            train_file:   self.train_file.clone(),
            test_file:    self.test_file.clone(),
            batch_size:   self.batch_size,
            max_seq_len:  self.max_seq_len,
            val_fraction: self.val_fraction,
            shuffle:      self.shuffle,
            seed:         self.seed,
        }
    }

    pub fn train_settings(&self) -> TrainSettings {
        TrainSettings { epochs: self.epochs, validation_every: self.validation_every }
    }

    /// One `### key = value` line per field, encoder fields flattened.
    pub fn log_fields(&self) -> Result<()> {
        tracing::info!("### Run configuration");
        let value = serde_json::to_value(self)?;
        let mut fields: Vec<(String, serde_json::Value)> = Vec::new();
        if let serde_json::Value::Object(map) = value {
            for (key, v) in map {
                match v {
                    serde_json::Value::Object(inner) => fields.extend(inner),
                    other => fields.push((key, other)),
                }
            }
        }
        for (key, v) in fields {
            tracing::info!("### {key} = {v}");
        }
        Ok(())
    }
}
