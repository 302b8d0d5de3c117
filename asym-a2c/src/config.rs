//! Configuration of A2C.
use crate::Schedule;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`A2cModel`](crate::A2cModel) and [`learn`](crate::learn).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct A2cConfig {
    /// Steps per environment and update.
    pub nsteps: usize,
    pub total_timesteps: usize,
    pub vf_coef: f32,
    pub ent_coef: f32,
    /// Global-norm clipping of the gradient, disabled with `None`.
    pub max_grad_norm: Option<f32>,
    pub lr: f32,
    pub lr_schedule: Schedule,
    /// RMSProp epsilon.
    pub epsilon: f32,
    /// RMSProp decay.
    pub alpha: f32,
    pub gamma: f32,
    /// Updates between records.
    pub log_interval: usize,
    /// Environment steps between snapshots, rounded down to a multiple of the batch.
    pub save_timesteps: Option<usize>,
    /// Directory of snapshots.
    pub model_dir: Option<String>,
    /// Snapshot loaded before training.
    pub load_snapshot: Option<String>,
}

impl Default for A2cConfig {
    fn default() -> Self {
        Self {
            nsteps: 5,
            total_timesteps: 80_000_000,
            vf_coef: 0.5,
            ent_coef: 0.01,
            max_grad_norm: Some(0.5),
            lr: 7e-4,
            lr_schedule: Schedule::Linear,
            epsilon: 1e-5,
            alpha: 0.99,
            gamma: 0.99,
            log_interval: 100,
            save_timesteps: None,
            model_dir: None,
            load_snapshot: None,
        }
    }
}

impl A2cConfig {
    pub fn nsteps(mut self, v: usize) -> Self {
        self.nsteps = v;
        self
    }

    pub fn total_timesteps(mut self, v: usize) -> Self {
        self.total_timesteps = v;
        self
    }

    /// Sets the coefficients of the value loss and the entropy bonus.
    pub fn coefs(mut self, vf_coef: f32, ent_coef: f32) -> Self {
        self.vf_coef = vf_coef;
        self.ent_coef = ent_coef;
        self
    }

    pub fn max_grad_norm(mut self, v: Option<f32>) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Sets the initial learning rate and its schedule.
    pub fn lr(mut self, lr: f32, schedule: Schedule) -> Self {
        self.lr = lr;
        self.lr_schedule = schedule;
        self
    }

    /// Sets the decay and epsilon of RMSProp.
    pub fn rmsprop(mut self, alpha: f32, epsilon: f32) -> Self {
        self.alpha = alpha;
        self.epsilon = epsilon;
        self
    }

    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v;
        self
    }

    pub fn save_timesteps(mut self, v: Option<usize>) -> Self {
        self.save_timesteps = v;
        self
    }

    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    pub fn load_snapshot(mut self, v: impl Into<String>) -> Self {
        self.load_snapshot = Some(v.into());
        self
    }

    /// Checks the ranges of the parameters.
    pub fn validate(&self) -> Result<()> {
        use asym_core::AsymError::Precondition;
        if self.nsteps == 0 || self.log_interval == 0 {
            return Err(Precondition("nsteps and log_interval must be positive".into()).into());
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(Precondition(format!("gamma must be in [0, 1], got {}", self.gamma)).into());
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return Err(Precondition(format!("alpha must be in [0, 1), got {}", self.alpha)).into());
        }
        if let Some(v) = self.max_grad_norm.filter(|v| *v <= 0.0) {
            return Err(Precondition(format!("max_grad_norm must be positive, got {}", v)).into());
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
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
    fn test_serde_a2c_config() -> Result<()> {
        let config = A2cConfig::default()
            .nsteps(16)
            .lr(1e-3, Schedule::Constant)
            .save_timesteps(Some(10_000))
            .model_dir("runs/a2c");

        let dir = TempDir::new("a2c_config")?;
        let path = dir.path().join("a2c_config.yaml");
        config.save(&path)?;
        assert_eq!(config, A2cConfig::load(&path)?);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(A2cConfig::default().validate().is_ok());
        assert!(A2cConfig::default().nsteps(0).validate().is_err());
        assert!(A2cConfig::default().gamma(-0.1).validate().is_err());
        assert!(A2cConfig::default().max_grad_norm(Some(0.0)).validate().is_err());
    }
}
