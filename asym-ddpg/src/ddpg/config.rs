//! Configuration of the DDPG agent.
use anyhow::Result;
use asym_core::{
    noise::NoiseConfig,
    replay_buffer::{IwScheduler, ReplayBufferConfig},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Parameters of the Adam optimizers of actor and critic.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AdamConfig {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Constructs [`Ddpg`](super::Ddpg).
///
/// ```rust
/// use asym_ddpg::DdpgConfig;
///
/// let config = DdpgConfig::default()
///     .gamma(0.98)
///     .batch_size(32)
///     .nsteps(5)
///     .lambda_pretrain(1.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DdpgConfig {
    /// Discount factor.
    pub gamma: f32,

    /// Rate of the soft update of target networks.
    pub tau: f32,

    pub batch_size: usize,

    /// Lookahead of the n-step return.
    pub nsteps: usize,

    /// Pop-Art return normalization. Not supported; enabling it fails at build.
    pub enable_popart: bool,

    pub normalize_observations: bool,
    pub normalize_state: bool,
    pub normalize_aux: bool,

    /// Clipping ranges applied after normalization.
    pub observation_range: (f32, f32),
    pub state_range: (f32, f32),
    pub aux_range: (f32, f32),

    /// Range of actions returned by the actor.
    pub action_range: (f32, f32),

    /// Clipping range of TD targets, unbounded if `None`.
    pub return_range: Option<(f32, f32)>,

    pub critic_l2_reg: f32,
    pub actor_lr: f32,
    pub critic_lr: f32,

    /// Maximal global norm of the gradients, no clipping if `None`.
    pub clip_norm: Option<f32>,

    /// Rewards are multiplied by this value when stored.
    pub reward_scale: f32,

    /// Weight of the 1-step TD loss.
    pub lambda_1step: f32,

    /// Weight of the n-step TD loss.
    pub lambda_nstep: f32,

    /// Weight of the large-margin loss on demonstrations.
    pub lambda_pretrain: f32,

    /// Upper bound of the margin between expert and actor actions.
    pub margin_limit: f32,

    /// Squared action distance at which the margin reaches half its limit.
    pub margin_tolerance: f32,

    /// Adds a behavior-cloning term on demonstrations where the expert action has a
    /// higher value than the actor's.
    pub actor_demo_loss: bool,

    /// Schedule of the importance-weight exponent.
    pub iw_scheduler: IwScheduler,

    pub adam: AdamConfig,
    pub noise: NoiseConfig,
    pub replay_buffer: ReplayBufferConfig,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            tau: 0.001,
            batch_size: 128,
            nsteps: 10,
            enable_popart: false,
            normalize_observations: true,
            normalize_state: true,
            normalize_aux: true,
            observation_range: (0.0, 1.0),
            state_range: (-4.0, 4.0),
            aux_range: (-10.0, 10.0),
            action_range: (-1.0, 1.0),
            return_range: None,
            critic_l2_reg: 0.001,
            actor_lr: 1e-4,
            critic_lr: 1e-3,
            clip_norm: None,
            reward_scale: 1.0,
            lambda_1step: 1.0,
            lambda_nstep: 1.0,
            lambda_pretrain: 0.0,
            margin_limit: 0.01,
            margin_tolerance: 0.01,
            actor_demo_loss: false,
            iw_scheduler: IwScheduler::default(),
            adam: AdamConfig::default(),
            noise: NoiseConfig::default(),
            replay_buffer: ReplayBufferConfig::default(),
        }
    }
}

impl DdpgConfig {
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    pub fn tau(mut self, v: f32) -> Self {
        self.tau = v;
        self
    }

    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    pub fn nsteps(mut self, v: usize) -> Self {
        self.nsteps = v;
        self
    }

    pub fn enable_popart(mut self, v: bool) -> Self {
        self.enable_popart = v;
        self
    }

    /// Switches all input normalizers on or off.
    pub fn normalize_inputs(mut self, v: bool) -> Self {
        self.normalize_observations = v;
        self.normalize_state = v;
        self.normalize_aux = v;
        self
    }

    pub fn observation_range(mut self, lo: f32, hi: f32) -> Self {
        self.observation_range = (lo, hi);
        self
    }

    pub fn state_range(mut self, lo: f32, hi: f32) -> Self {
        self.state_range = (lo, hi);
        self
    }

    pub fn aux_range(mut self, lo: f32, hi: f32) -> Self {
        self.aux_range = (lo, hi);
        self
    }

    pub fn action_range(mut self, lo: f32, hi: f32) -> Self {
        self.action_range = (lo, hi);
        self
    }

    pub fn return_range(mut self, v: Option<(f32, f32)>) -> Self {
        self.return_range = v;
        self
    }

    pub fn critic_l2_reg(mut self, v: f32) -> Self {
        self.critic_l2_reg = v;
        self
    }

    pub fn actor_lr(mut self, v: f32) -> Self {
        self.actor_lr = v;
        self
    }

    pub fn critic_lr(mut self, v: f32) -> Self {
        self.critic_lr = v;
        self
    }

    pub fn clip_norm(mut self, v: Option<f32>) -> Self {
        self.clip_norm = v;
        self
    }

    pub fn reward_scale(mut self, v: f32) -> Self {
        self.reward_scale = v;
        self
    }

    pub fn lambda_1step(mut self, v: f32) -> Self {
        self.lambda_1step = v;
        self
    }

    pub fn lambda_nstep(mut self, v: f32) -> Self {
        self.lambda_nstep = v;
        self
    }

    pub fn lambda_pretrain(mut self, v: f32) -> Self {
        self.lambda_pretrain = v;
        self
    }

    pub fn margin(mut self, limit: f32, tolerance: f32) -> Self {
        self.margin_limit = limit;
        self.margin_tolerance = tolerance;
        self
    }

    pub fn actor_demo_loss(mut self, v: bool) -> Self {
        self.actor_demo_loss = v;
        self
    }

    pub fn iw_scheduler(mut self, v: IwScheduler) -> Self {
        self.iw_scheduler = v;
        self
    }

    pub fn noise(mut self, v: NoiseConfig) -> Self {
        self.noise = v;
        self
    }

    pub fn replay_buffer(mut self, v: ReplayBufferConfig) -> Self {
        self.replay_buffer = v;
        self
    }

    /// Checks values that would make training meaningless.
    pub fn validate(&self) -> Result<()> {
        use asym_core::AsymError::Precondition;
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(Precondition(format!("gamma must be in [0, 1], got {}", self.gamma)).into());
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return Err(Precondition(format!("tau must be in [0, 1], got {}", self.tau)).into());
        }
        if self.batch_size == 0 || self.nsteps == 0 {
            return Err(Precondition("batch_size and nsteps must be positive".into()).into());
        }
        if self.margin_tolerance <= 0.0 {
            return Err(Precondition("margin_tolerance must be positive".into()).into());
        }
        self.replay_buffer.validate()
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
    use asym_core::noise::ActionNoiseConfig;
    use tempdir::TempDir;

    #[test]
    fn test_serde_ddpg_config() -> Result<()> {
        let config = DdpgConfig::default()
            .tau(0.01)
            .return_range(Some((-50.0, 0.0)))
            .noise(NoiseConfig::default().action(Some(ActionNoiseConfig::Normal { stddev: 0.2 })));

        let dir = TempDir::new("ddpg_config")?;
        let path = dir.path().join("ddpg_config.yaml");
        config.save(&path)?;
        let config_ = DdpgConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(DdpgConfig::default().validate().is_ok());
        assert!(DdpgConfig::default().gamma(1.5).validate().is_err());
        assert!(DdpgConfig::default().nsteps(0).validate().is_err());
    }
}
