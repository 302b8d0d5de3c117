//! Optimizers over flat parameter vectors.
//!
//! [`SyncOptimizer`] averages local gradients over all workers before delegating to
//! an [`Optimizer`], which keeps parameters identical across a data-parallel group.
use crate::{comm::Communicator, error::AsymError};
use anyhow::Result;
use log::trace;
use serde::{Deserialize, Serialize};

/// A first-order optimizer.
pub trait Optimizer {
    /// Applies one update with step size `lr`.
    fn step(&mut self, params: &mut [f32], grad: &[f32], lr: f32);
}

/// Adam with bias correction folded into the step size.
///
/// `a = lr * sqrt(1 - beta2^t) / (1 - beta1^t)`, `theta <- theta - a m / (sqrt(v) + eps)`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<f32>,
    v: Vec<f32>,
    t: i32,
}

impl Adam {
    pub fn new(n_params: usize, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            beta1,
            beta2,
            epsilon,
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            t: 0,
        }
    }

    /// Number of steps taken.
    pub fn t(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [f32], grad: &[f32], lr: f32) {
        debug_assert_eq!(params.len(), self.m.len());
        self.t += 1;
        let a = lr * (1.0 - self.beta2.powi(self.t)).sqrt() / (1.0 - self.beta1.powi(self.t));
        for i in 0..params.len() {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * grad[i];
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * grad[i] * grad[i];
            params[i] -= a * self.m[i] / (self.v[i].sqrt() + self.epsilon);
        }
    }
}

/// RMSProp, `ms <- decay ms + (1 - decay) g^2`, `theta <- theta - lr g / sqrt(ms + eps)`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RmsProp {
    pub decay: f32,
    pub epsilon: f32,
    ms: Vec<f32>,
}

impl RmsProp {
    pub fn new(n_params: usize, decay: f32, epsilon: f32) -> Self {
        Self {
            decay,
            epsilon,
            ms: vec![0.0; n_params],
        }
    }
}

impl Optimizer for RmsProp {
    fn step(&mut self, params: &mut [f32], grad: &[f32], lr: f32) {
        debug_assert_eq!(params.len(), self.ms.len());
        for i in 0..params.len() {
            self.ms[i] = self.decay * self.ms[i] + (1.0 - self.decay) * grad[i] * grad[i];
            params[i] -= lr * grad[i] / (self.ms[i] + self.epsilon).sqrt();
        }
    }
}

/// Global L2 norm of a gradient.
pub fn global_norm(grad: &[f32]) -> f32 {
    grad.iter().map(|g| g * g).sum::<f32>().sqrt()
}

/// Rescales `grad` so that its global norm is at most `max_norm`. Returns the norm
/// before clipping.
pub fn clip_by_global_norm(grad: &mut [f32], max_norm: f32) -> f32 {
    let norm = global_norm(grad);
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        grad.iter_mut().for_each(|g| *g *= scale);
    }
    norm
}

/// An optimizer driven by gradients averaged over a worker group.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SyncOptimizer<O> {
    opt: O,
    n_params: usize,
}

impl<O: Optimizer> SyncOptimizer<O> {
    pub fn new(opt: O, n_params: usize) -> Self {
        Self { opt, n_params }
    }

    pub fn inner(&self) -> &O {
        &self.opt
    }

    /// Averages `local_grad` over the group and applies one step.
    pub fn update<C: Communicator + ?Sized>(
        &mut self,
        comm: &C,
        params: &mut [f32],
        local_grad: &[f32],
        lr: f32,
    ) -> Result<()> {
        if params.len() != self.n_params {
            return Err(AsymError::shape("parameters", self.n_params, params.len()).into());
        }
        if local_grad.len() != self.n_params {
            return Err(AsymError::shape("gradient", self.n_params, local_grad.len()).into());
        }
        let mut grad = local_grad.to_vec();
        comm.all_reduce_mean(&mut grad)?;
        self.opt.step(params, &grad, lr);
        Ok(())
    }

    /// Copies the parameters of rank 0 to every worker.
    pub fn sync<C: Communicator + ?Sized>(&self, comm: &C, params: &mut [f32]) -> Result<()> {
        trace!("sync {} parameters from rank 0", params.len());
        comm.broadcast(params)
    }
}
