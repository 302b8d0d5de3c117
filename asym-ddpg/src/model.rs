//! Function approximators used by [`Ddpg`](crate::Ddpg).
//!
//! The agent never differentiates anything itself. Models expose their parameters
//! as flat vectors and compute vector-Jacobian products: given the gradient of a
//! loss with respect to their outputs, they return the gradient with respect to
//! their parameters (and, for critics, with respect to the input actions).
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;

/// A model with a flat parameter vector.
pub trait ParamModel {
    /// Name given at construction, e.g. `"target_actor"`.
    fn scope(&self) -> &str;

    fn params(&self) -> &[f32];

    fn params_mut(&mut self) -> &mut [f32];

    fn num_params(&self) -> usize {
        self.params().len()
    }

    /// Parameters perturbed by parameter noise. Layer-normalization gains and
    /// biases are typically excluded.
    fn perturbable(&self) -> Vec<bool> {
        vec![true; self.num_params()]
    }

    /// Parameters subject to L2 regularization. Biases are typically excluded.
    fn regularizable(&self) -> Vec<bool> {
        vec![true; self.num_params()]
    }
}

/// Deterministic policy `a = pi(obs, aux)`.
pub trait ActorModel: ParamModel {
    /// Actions for a batch, one row per sample.
    fn forward(&self, obs: ArrayView2<f32>, aux: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Gradient with respect to the parameters of `sum(d_act * pi(obs, aux))`.
    fn backward(
        &self,
        obs: ArrayView2<f32>,
        aux: ArrayView2<f32>,
        d_act: ArrayView2<f32>,
    ) -> Result<Vec<f32>>;
}

/// Inputs of an asymmetric critic, one row per sample.
pub struct CriticInput<'a> {
    pub state: ArrayView2<'a, f32>,
    pub goal: ArrayView2<'a, f32>,
    pub act: ArrayView2<'a, f32>,
    pub aux: ArrayView2<'a, f32>,
}

/// Gradients returned by [`CriticModel::backward`].
pub struct CriticGrad {
    pub params: Vec<f32>,
    pub act: Array2<f32>,
}

/// Action-value function `Q(state, goal, act, aux)`.
pub trait CriticModel: ParamModel {
    fn forward(&self, input: &CriticInput) -> Result<Array1<f32>>;

    /// Gradients of `sum(d_q * Q(input))` with respect to the parameters and to
    /// the actions.
    fn backward(&self, input: &CriticInput, d_q: ArrayView1<f32>) -> Result<CriticGrad>;
}

/// Factory of models.
///
/// The agent calls it once per network scope instead of cloning models, so every
/// network gets its own parameters.
pub trait ModelBuilder<M> {
    fn build(&self, scope: &str, rng: &mut StdRng) -> Result<M>;
}

impl<M, F> ModelBuilder<M> for F
where
    F: Fn(&str, &mut StdRng) -> Result<M>,
{
    fn build(&self, scope: &str, rng: &mut StdRng) -> Result<M> {
        self(scope, rng)
    }
}
