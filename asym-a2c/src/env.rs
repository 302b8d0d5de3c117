//! Vectorized environments.
use anyhow::Result;
use ndarray::{Array1, Array2};

/// Outcome of stepping every environment once.
#[derive(Clone, Debug)]
pub struct VecStep {
    /// Next observations, one row per environment. A finished environment is
    /// reset and reports the first observation of its next episode.
    pub obs: Array2<f32>,
    pub rewards: Array1<f32>,
    pub dones: Vec<bool>,
}

/// A batch of environments with discrete actions stepped in lockstep.
pub trait VecEnv {
    fn num_envs(&self) -> usize;

    /// Resets every environment and returns the observations.
    fn reset(&mut self) -> Result<Array2<f32>>;

    /// Applies `actions[i]` to environment `i`.
    fn step(&mut self, actions: &[usize]) -> Result<VecStep>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
