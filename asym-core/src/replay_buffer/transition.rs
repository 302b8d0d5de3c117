use super::TransitionDims;
use crate::error::AsymError;
use anyhow::Result;
use ndarray::Array1;

/// A single environment transition.
///
/// `state` and `next_state` are the full simulator states used by the critic,
/// `obs` and `next_obs` the observations used by the actor.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f32>,
    pub obs: Array1<f32>,
    pub act: Array1<f32>,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub next_obs: Array1<f32>,
    pub is_terminated: bool,
    pub goal: Array1<f32>,
    pub goal_obs: Array1<f32>,
    pub aux: Array1<f32>,
    pub next_aux: Array1<f32>,
}

impl Transition {
    /// A transition filled with zeros.
    pub fn zeros(dims: &TransitionDims) -> Self {
        Self {
            state: Array1::zeros(dims.state),
            obs: Array1::zeros(dims.obs),
            act: Array1::zeros(dims.act),
            reward: 0.0,
            next_state: Array1::zeros(dims.state),
            next_obs: Array1::zeros(dims.obs),
            is_terminated: false,
            goal: Array1::zeros(dims.goal),
            goal_obs: Array1::zeros(dims.goal_obs),
            aux: Array1::zeros(dims.aux),
            next_aux: Array1::zeros(dims.aux),
        }
    }

    /// Checks the sizes of all vector fields.
    pub fn check_dims(&self, dims: &TransitionDims) -> Result<()> {
        let fields = [
            ("state", self.state.len(), dims.state),
            ("obs", self.obs.len(), dims.obs),
            ("act", self.act.len(), dims.act),
            ("next_state", self.next_state.len(), dims.state),
            ("next_obs", self.next_obs.len(), dims.obs),
            ("goal", self.goal.len(), dims.goal),
            ("goal_obs", self.goal_obs.len(), dims.goal_obs),
            ("aux", self.aux.len(), dims.aux),
            ("next_aux", self.next_aux.len(), dims.aux),
        ];
        for (what, actual, expected) in fields {
            if actual != expected {
                return Err(AsymError::shape(what, expected, actual).into());
            }
        }
        Ok(())
    }
}
