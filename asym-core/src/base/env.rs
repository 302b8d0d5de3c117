//! Environment.
use crate::{record::Record, replay_buffer::TransitionDims};
use anyhow::Result;
use ndarray::Array1;

/// A box in `R^n`.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxSpace {
    pub low: Array1<f32>,
    pub high: Array1<f32>,
}

impl BoxSpace {
    pub fn new(low: Array1<f32>, high: Array1<f32>) -> Self {
        Self { low, high }
    }

    /// The box `[-bound, bound]^n`.
    pub fn symmetric(dim: usize, bound: f32) -> Self {
        Self {
            low: Array1::from_elem(dim, -bound),
            high: Array1::from_elem(dim, bound),
        }
    }

    pub fn dim(&self) -> usize {
        self.high.len()
    }

    /// Returns `true` if `low == -high`.
    pub fn is_symmetric(&self) -> bool {
        self.low.len() == self.high.len()
            && self.low.iter().zip(self.high.iter()).all(|(l, h)| *l == -*h)
    }
}

/// Shapes exposed by an environment.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvSpaces {
    pub action: BoxSpace,
    pub obs_dim: usize,
    pub state_dim: usize,
    pub aux_dim: usize,
    pub goal_dim: usize,
    pub goal_obs_dim: usize,
}

impl EnvSpaces {
    /// Dimensions of the transitions produced by the environment.
    pub fn transition_dims(&self) -> TransitionDims {
        TransitionDims {
            state: self.state_dim,
            obs: self.obs_dim,
            act: self.action.dim(),
            goal: self.goal_dim,
            goal_obs: self.goal_obs_dim,
            aux: self.aux_dim,
        }
    }
}

/// Result of an environment step.
#[derive(Clone, Debug)]
pub struct Step {
    pub obs: Array1<f32>,
    pub reward: f32,
    pub is_done: bool,
    pub info: Record,
}

/// A goal-conditioned environment with an asymmetric view.
///
/// The actor sees observations (e.g. rendered images) and auxiliary features; the
/// critic additionally sees the full simulator state and the goal.
pub trait Env {
    /// Starts an episode and returns the first observation.
    fn reset(&mut self) -> Result<Array1<f32>>;

    /// Applies an action in the environment's own scale.
    fn step(&mut self, act: &Array1<f32>) -> Result<Step>;

    /// Full simulator state.
    fn get_state(&self) -> Array1<f32>;

    /// Auxiliary features of the current state.
    fn get_aux(&self) -> Array1<f32>;

    /// Goal in state space.
    fn goal_state(&self) -> Array1<f32>;

    /// Goal in observation space.
    fn goal_obs(&self) -> Array1<f32>;

    fn spaces(&self) -> EnvSpaces;

    /// Renders the current frame.
    fn render(&mut self) -> Result<()> {
        Ok(())
    }
}
