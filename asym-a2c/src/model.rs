//! Policy and value function.
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A categorical policy sharing its parameters with a state-value function.
///
/// Like the models of the DDPG agent, it exposes a flat parameter vector and
/// computes vector-Jacobian products instead of relying on automatic
/// differentiation.
pub trait ActorCriticModel {
    fn params(&self) -> &[f32];

    fn params_mut(&mut self) -> &mut [f32];

    fn num_actions(&self) -> usize;

    /// Unnormalized log-probabilities and values, one row per observation.
    fn forward(&self, obs: ArrayView2<f32>) -> Result<(Array2<f32>, Array1<f32>)>;

    /// Gradient with respect to the parameters of
    /// `sum(d_logits * logits(obs)) + sum(d_values * values(obs))`.
    fn backward(
        &self,
        obs: ArrayView2<f32>,
        d_logits: ArrayView2<f32>,
        d_values: ArrayView1<f32>,
    ) -> Result<Vec<f32>>;
}
