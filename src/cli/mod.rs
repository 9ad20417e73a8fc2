// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — fine-tunes on a SQuAD file, keeps the best
//                  checkpoint
//   2. `predict` — answers the test file with that checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::application::config::{EncoderConfig, RunConfig, TaskConfig};
use commands::{Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "squad-qa",
    version,
    about = "Fine-tune a BERT-style span extractor on SQuAD, then predict answers."
)]
pub struct Cli {
    /// Directory for the daily rolling log file
    #[arg(long, global = true, env = "SQUAD_QA_LOGS_DIR", default_value = "logs")]
    pub logs_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Merge CLI task settings with the encoder's config.json.
fn run_config(task: TaskConfig) -> Result<RunConfig> {
    let encoder = EncoderConfig::load(&task.pretrained_dir)?;
    Ok(RunConfig::merge(task, encoder))
}

impl Cli {
    /// Dispatch to the matching use case. This layer only routes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.train_file.display());
    TrainUseCase::new(run_config(args.into())?).execute()?;

    println!("Training complete.");
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let task = TaskConfig::from(&args);
    let predictions = PredictUseCase::new(run_config(task)?, args.output).execute()?;

    println!("Predicted {} answers.", predictions.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::Device;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["squad-qa", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let task = TaskConfig::from(args);
        assert_eq!(task.batch_size, 16);
        assert_eq!(task.epochs, 3);
        assert_eq!(task.learning_rate, 5e-5);
        assert_eq!(task.validation_every, 1);
        assert!(task.shuffle);
        assert_eq!(task.max_seq_len, None);
        assert_eq!(task.model_save_dir, PathBuf::from("cache"));
        assert_eq!(cli.logs_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_predict_flags() {
        let cli = Cli::try_parse_from([
            "squad-qa", "predict", "--device", "wgpu", "--max-seq-len", "384",
            "--output", "out.json", "--logs-dir", "/tmp/l",
        ])
        .unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        let task = TaskConfig::from(&args);
        assert_eq!(task.device, Device::Wgpu);
        assert_eq!(task.max_seq_len, Some(384));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(cli.logs_dir, PathBuf::from("/tmp/l"));
    }

    #[test]
    fn test_shuffle_can_be_turned_off() {
        let cli = Cli::try_parse_from(["squad-qa", "train", "--shuffle", "false"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert!(!args.shuffle);
    }
}
