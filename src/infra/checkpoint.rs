// ============================================================
// Layer 6 — Checkpoint Policy
// ============================================================
// Decides when the live model may overwrite the on-disk best
// checkpoint, and restores it at startup.
//
// What lives in the model directory:
//   model.<ext>        ← weights of the best validation pass
//                        (burn CompactRecorder → model.mpk)
//   model_meta.json    ← accuracy + epoch of those weights
//   run_config.json    ← merged run configuration
//
// There is exactly one weights artifact; it is always overwritten.
//
// Resume asymmetry (known limitation, kept on purpose):
//   At startup the weights are reloaded but the best-accuracy
//   tracker restarts at MIN_ACCURACY, so the first validation
//   pass of a resumed run can overwrite a better checkpoint.
//   `restore_best_accuracy` opts into seeding the tracker from
//   model_meta.json instead.
//
// The state is an explicit value: `resume` produces it and
// `after_validation` takes it and hands back the next one.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
};

use crate::application::config::RunConfig;
use crate::domain::traits::Checkpointable;

/// Lowest possible exact-match accuracy; the tracker's starting value.
pub const MIN_ACCURACY: f64 = 0.0;

const WEIGHTS_STEM:  &str = "model";
const META_FILE:     &str = "model_meta.json";
const CONFIG_FILE:   &str = "run_config.json";

// ─── CheckpointState ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckpointState {
    NoCheckpoint,
    /// `best_accuracy` is `None` when the weights were reloaded but
    /// their accuracy is not tracked for this run.
    HasCheckpoint { best_accuracy: Option<f64> },
}

impl CheckpointState {
    /// Current value of the best-accuracy tracker.
    pub fn best_accuracy(&self) -> f64 {
        match self {
            CheckpointState::HasCheckpoint { best_accuracy: Some(acc) } => *acc,
            _ => MIN_ACCURACY,
        }
    }

    pub fn has_checkpoint(&self) -> bool {
        matches!(self, CheckpointState::HasCheckpoint { .. })
    }
}

/// Outcome of one validation hand-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckpointDecision {
    Persisted { previous_best: f64 },
    Kept { best: f64 },
}

impl CheckpointDecision {
    pub fn persisted(&self) -> bool {
        matches!(self, CheckpointDecision::Persisted { .. })
    }
}

/// Sidecar written next to the weights on every persist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub accuracy: f64,
    pub epoch:    usize,
}

// ─── CheckpointPolicy ────────────────────────────────────────────────────────
pub struct CheckpointPolicy {
    dir:                   PathBuf,
    restore_best_accuracy: bool,
}

impl CheckpointPolicy {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, restore_best_accuracy: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, restore_best_accuracy })
    }

    /// Base path handed to `Checkpointable` (no extension).
    pub fn weights_base(&self) -> PathBuf {
        self.dir.join(WEIGHTS_STEM)
    }

    pub fn artifact_path<M: Checkpointable>(&self) -> PathBuf {
        self.weights_base().with_extension(M::EXTENSION)
    }

    /// Load the persisted weights into `model` if an artifact exists.
    pub fn resume<M: Checkpointable>(&self, model: M) -> Result<(M, CheckpointState)> {
        let artifact = self.artifact_path::<M>();
        if !artifact.exists() {
            tracing::info!("No checkpoint at '{}', training from scratch", artifact.display());
            return Ok((model, CheckpointState::NoCheckpoint));
        }

        let model = model
            .load_weights(&self.weights_base())
            .with_context(|| format!("Cannot load checkpoint '{}'", artifact.display()))?;
        tracing::info!("Loaded existing checkpoint '{}', continuing training", artifact.display());

        let best_accuracy = if self.restore_best_accuracy {
            let meta = self.read_meta()?;
            match meta {
                Some(m) => tracing::info!(
                    "Best accuracy restored from checkpoint metadata: {:.4} (epoch {})",
                    m.accuracy,
                    m.epoch,
                ),
                None => tracing::warn!("No checkpoint metadata found, best accuracy starts at {MIN_ACCURACY}"),
            }
            meta.map(|m| m.accuracy)
        } else {
            tracing::warn!(
                "Best accuracy restarts at {MIN_ACCURACY} for this run; a worse validation \
                 pass may overwrite the loaded checkpoint"
            );
            None
        };

        Ok((model, CheckpointState::HasCheckpoint { best_accuracy }))
    }

    /// Load the persisted weights, failing if there are none.
    pub fn load_for_inference<M: Checkpointable>(&self, model: M) -> Result<M> {
        let artifact = self.artifact_path::<M>();
        if !artifact.exists() {
            anyhow::bail!(
                "No checkpoint at '{}'. Have you trained the model first?",
                artifact.display()
            );
        }
        model
            .load_weights(&self.weights_base())
            .with_context(|| format!("Cannot load checkpoint '{}'", artifact.display()))
    }

    /// Persist iff `accuracy` strictly beats the tracker.
    pub fn after_validation<M: Checkpointable>(
        &self,
        state:    CheckpointState,
        accuracy: f64,
        epoch:    usize,
        model:    &M,
    ) -> Result<(CheckpointState, CheckpointDecision)> {
        let best = state.best_accuracy();
        if accuracy <= best || accuracy.is_nan() {
            return Ok((state, CheckpointDecision::Kept { best }));
        }

        model
            .save_weights(&self.weights_base())
            .with_context(|| format!("Failed to save checkpoint to '{}'", self.dir.display()))?;
        self.write_meta(&CheckpointMeta { accuracy, epoch })?;
        tracing::info!(
            "Validation accuracy improved {:.4} -> {:.4}, checkpoint saved",
            best,
            accuracy
        );

        Ok((
            CheckpointState::HasCheckpoint { best_accuracy: Some(accuracy) },
            CheckpointDecision::Persisted { previous_best: best },
        ))
    }

    pub fn read_meta(&self) -> Result<Option<CheckpointMeta>> {
        let path = self.dir.join(META_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write_meta(&self, meta: &CheckpointMeta) -> Result<()> {
        let path = self.dir.join(META_FILE);
        fs::write(&path, serde_json::to_string_pretty(meta)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote checkpoint metadata to '{}'", path.display());
        Ok(())
    }

    /// Save the merged run configuration so `predict` can rebuild the model.
    pub fn save_config(&self, cfg: &RunConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    /// The configuration saved by the training run, if there was one.
    pub fn load_config(&self) -> Result<Option<RunConfig>> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

// ─── Unit Tests ──────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::ScriptedModel;

    fn model_with_steps(steps: usize) -> ScriptedModel {
        let mut m = ScriptedModel::new();
        m.steps = steps;
        m
    }

    #[test]
    fn test_fresh_directory_has_no_checkpoint() {
        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), false).unwrap();
        let (_, state) = policy.resume(ScriptedModel::new()).unwrap();
        assert_eq!(state, CheckpointState::NoCheckpoint);
        assert_eq!(state.best_accuracy(), MIN_ACCURACY);
    }

    #[test]
    fn test_persists_only_on_strict_improvement() {
        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), false).unwrap();
        let state  = CheckpointState::NoCheckpoint;

        // equal to the starting tracker → nothing written
        let (state, d) = policy.after_validation(state, 0.0, 0, &model_with_steps(1)).unwrap();
        assert_eq!(d, CheckpointDecision::Kept { best: 0.0 });
        assert!(!policy.artifact_path::<ScriptedModel>().exists());

        let (state, d) = policy.after_validation(state, 0.4, 1, &model_with_steps(2)).unwrap();
        assert!(d.persisted());
        assert_eq!(state.best_accuracy(), 0.4);

        let (state, d) = policy.after_validation(state, 0.4, 2, &model_with_steps(3)).unwrap();
        assert_eq!(d, CheckpointDecision::Kept { best: 0.4 });
        let (state, d) = policy.after_validation(state, 0.3, 3, &model_with_steps(4)).unwrap();
        assert!(!d.persisted());
        assert_eq!(state.best_accuracy(), 0.4);

        // the artifact still holds the epoch-1 weights
        let loaded = policy.load_for_inference(ScriptedModel::new()).unwrap();
        assert_eq!(loaded.steps, 2);
        assert_eq!(policy.read_meta().unwrap(), Some(CheckpointMeta { accuracy: 0.4, epoch: 1 }));
    }

    #[test]
    fn test_persisting_strictly_increases_tracker() {
        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), false).unwrap();
        let mut state = CheckpointState::NoCheckpoint;
        for (epoch, acc) in [0.1, 0.05, 0.2, 0.2, 0.9, 0.5].into_iter().enumerate() {
            let before = state.best_accuracy();
            let (next, d) = policy.after_validation(state, acc, epoch, &ScriptedModel::new()).unwrap();
            if d.persisted() {
                assert!(next.best_accuracy() > before);
            } else {
                assert_eq!(next.best_accuracy(), before);
            }
            state = next;
        }
        assert_eq!(state.best_accuracy(), 0.9);
    }

    #[test]
    fn test_resume_reloads_weights_but_not_accuracy() {
        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), false).unwrap();
        policy
            .after_validation(CheckpointState::NoCheckpoint, 0.8, 0, &model_with_steps(7))
            .unwrap();

        let (model, state) = policy.resume(ScriptedModel::new()).unwrap();
        assert_eq!(model.steps, 7);
        assert_eq!(state, CheckpointState::HasCheckpoint { best_accuracy: None });
        assert_eq!(state.best_accuracy(), MIN_ACCURACY);

        // a worse pass now overwrites the better checkpoint
        let (_, d) = policy.after_validation(state, 0.5, 1, &model_with_steps(9)).unwrap();
        assert!(d.persisted());
        assert_eq!(policy.load_for_inference(ScriptedModel::new()).unwrap().steps, 9);
    }

    #[test]
    fn test_resume_can_restore_accuracy_when_asked() {
        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), true).unwrap();
        policy
            .after_validation(CheckpointState::NoCheckpoint, 0.8, 4, &model_with_steps(7))
            .unwrap();

        let (_, state) = policy.resume(ScriptedModel::new()).unwrap();
        assert_eq!(state.best_accuracy(), 0.8);
        let (_, d) = policy.after_validation(state, 0.5, 5, &model_with_steps(9)).unwrap();
        assert!(!d.persisted());
    }

    #[test]
    fn test_inference_load_requires_artifact() {
        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), false).unwrap();
        assert!(policy.load_for_inference(ScriptedModel::new()).is_err());
    }

    #[test]
    fn test_run_config_is_saved_beside_weights() {
        use crate::application::config::{EncoderConfig, RunConfig, TaskConfig};

        let dir    = tempfile::tempdir().unwrap();
        let policy = CheckpointPolicy::new(dir.path(), false).unwrap();
        assert_eq!(policy.load_config().unwrap(), None);

        let cfg = RunConfig::merge(TaskConfig::default(), EncoderConfig::default());
        policy.save_config(&cfg).unwrap();
        assert_eq!(policy.load_config().unwrap(), Some(cfg));
    }
}
