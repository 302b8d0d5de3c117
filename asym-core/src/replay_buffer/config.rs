//! Configuration of [`PrioritizedReplayBuffer`](super::PrioritizedReplayBuffer).
use crate::AsymError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Sizes of the vector fields of a transition.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub struct TransitionDims {
    /// Full simulator state, seen by the critic.
    pub state: usize,

    /// Observation, seen by the actor.
    pub obs: usize,

    /// Action.
    pub act: usize,

    /// Goal in state space.
    pub goal: usize,

    /// Goal in observation space.
    pub goal_obs: usize,

    /// Auxiliary features, seen by both actor and critic.
    pub aux: usize,
}

impl TransitionDims {
    /// Dimensions with the goal sizes equal to the state/observation sizes.
    pub fn new(state: usize, obs: usize, act: usize, aux: usize) -> Self {
        Self {
            state,
            obs,
            act,
            goal: state,
            goal_obs: obs,
            aux,
        }
    }

    /// Fails with [`AsymError::ShapeMismatch`] on the first field where `actual`
    /// differs from `self`.
    pub fn check(&self, actual: &TransitionDims) -> Result<()> {
        for (what, expected, actual) in [
            ("state", self.state, actual.state),
            ("observation", self.obs, actual.obs),
            ("action", self.act, actual.act),
            ("goal", self.goal, actual.goal),
            ("goal observation", self.goal_obs, actual.goal_obs),
            ("auxiliary", self.aux, actual.aux),
        ] {
            if expected != actual {
                return Err(AsymError::shape(what, expected, actual).into());
            }
        }
        Ok(())
    }
}

/// Configuration of the prioritized replay memory.
///
/// ```rust
/// use asym_core::replay_buffer::{ReplayBufferConfig, TransitionDims};
///
/// let config = ReplayBufferConfig::default()
///     .capacity(1000)
///     .alpha(0.6)
///     .dims(TransitionDims::new(4, 3, 2, 1));
/// assert_eq!(config.capacity, 1000);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Number of online (non-demonstration) transitions kept. Demonstrations are
    /// stored in a reserved region of up to the same size.
    pub capacity: usize,

    /// Prioritization exponent. `0` gives uniform sampling.
    pub alpha: f32,

    /// Added to `|td_error|` so that priorities stay positive.
    pub eps: f32,

    /// Sizes of the transition fields.
    pub dims: TransitionDims,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            alpha: 0.3,
            eps: 1e-6,
            dims: TransitionDims::default(),
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the prioritization exponent.
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the priority offset.
    pub fn eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Sets the transition dimensions.
    pub fn dims(mut self, dims: TransitionDims) -> Self {
        self.dims = dims;
        self
    }

    /// Checks that the store can be built from this configuration.
    pub fn validate(&self) -> Result<()> {
        use AsymError::Precondition;
        if self.capacity == 0 {
            return Err(Precondition("replay buffer capacity must be positive".into()).into());
        }
        if !(self.eps > 0.0) {
            return Err(Precondition(format!("eps must be positive, got {}", self.eps)).into());
        }
        if !(self.alpha >= 0.0) {
            return Err(Precondition(format!("alpha must be non-negative, got {}", self.alpha)).into());
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
