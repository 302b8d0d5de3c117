//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use asym_core::AsymError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// Step counts are per worker.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of epochs.
    pub nb_epochs: usize,

    /// Rollout/train/evaluation cycles per epoch.
    pub nb_epoch_cycles: usize,

    /// Environment steps per cycle.
    pub nb_rollout_steps: usize,

    /// Optimization steps per cycle.
    pub nb_train_steps: usize,

    /// Evaluation steps, run on the first cycle of every epoch.
    pub nb_eval_steps: usize,

    /// Interval of parameter noise adaptation in optimization steps.
    pub param_noise_adaption_interval: usize,

    /// Environment steps of the demonstration policy stored before training.
    pub num_demo_steps: usize,

    /// Optimization steps on demonstrations before the main loop.
    pub num_pretrain_steps: usize,

    pub render: bool,
    pub render_eval: bool,

    /// Where agent parameters and environment states are saved.
    pub model_dir: Option<String>,

    /// Directory of saved parameters. When set, the agent is evaluated only.
    pub load_from_file: Option<String>,

    /// Episodes run in evaluation-only mode.
    pub n_eval_only_episodes: usize,

    /// Length of the moving window of episode returns.
    pub history_len: usize,

    /// Name of the run, written to the summary.
    pub run_name: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            nb_epochs: 500,
            nb_epoch_cycles: 20,
            nb_rollout_steps: 200,
            nb_train_steps: 50,
            nb_eval_steps: 400,
            param_noise_adaption_interval: 50,
            num_demo_steps: 0,
            num_pretrain_steps: 0,
            render: false,
            render_eval: false,
            model_dir: None,
            load_from_file: None,
            n_eval_only_episodes: 20,
            history_len: 100,
            run_name: String::new(),
        }
    }
}

impl TrainerConfig {
    pub fn nb_epochs(mut self, v: usize) -> Self {
        self.nb_epochs = v;
        self
    }

    pub fn nb_epoch_cycles(mut self, v: usize) -> Self {
        self.nb_epoch_cycles = v;
        self
    }

    pub fn nb_rollout_steps(mut self, v: usize) -> Self {
        self.nb_rollout_steps = v;
        self
    }

    pub fn nb_train_steps(mut self, v: usize) -> Self {
        self.nb_train_steps = v;
        self
    }

    pub fn nb_eval_steps(mut self, v: usize) -> Self {
        self.nb_eval_steps = v;
        self
    }

    pub fn param_noise_adaption_interval(mut self, v: usize) -> Self {
        self.param_noise_adaption_interval = v;
        self
    }

    pub fn num_demo_steps(mut self, v: usize) -> Self {
        self.num_demo_steps = v;
        self
    }

    pub fn num_pretrain_steps(mut self, v: usize) -> Self {
        self.num_pretrain_steps = v;
        self
    }

    pub fn render(mut self, v: bool) -> Self {
        self.render = v;
        self
    }

    pub fn render_eval(mut self, v: bool) -> Self {
        self.render_eval = v;
        self
    }

    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    pub fn load_from_file(mut self, v: impl Into<String>) -> Self {
        self.load_from_file = Some(v.into());
        self
    }

    pub fn n_eval_only_episodes(mut self, v: usize) -> Self {
        self.n_eval_only_episodes = v;
        self
    }

    pub fn history_len(mut self, v: usize) -> Self {
        self.history_len = v;
        self
    }

    pub fn run_name(mut self, v: impl Into<String>) -> Self {
        self.run_name = v.into();
        self
    }

    /// Checks the step counts used as divisors.
    pub fn validate(&self) -> Result<()> {
        if self.param_noise_adaption_interval == 0 {
            return Err(AsymError::Precondition(
                "param_noise_adaption_interval must be positive".into(),
            )
            .into());
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .nb_epochs(3)
            .num_demo_steps(100)
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate_adaption_interval() {
        assert!(TrainerConfig::default().validate().is_ok());
        let err = TrainerConfig::default()
            .param_noise_adaption_interval(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AsymError>(),
            Some(AsymError::Precondition(_))
        ));
    }
}
