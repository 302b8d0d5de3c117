//! Annealing of the importance-weight exponent.
use serde::{Deserialize, Serialize};

/// Linear schedule of `beta`, the exponent of the importance-sampling weights.
///
/// `beta` moves from `beta_0` to `beta_final` over `n_opts_final` optimization steps
/// and stays at `beta_final` afterwards.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial value of `beta`.
    pub beta_0: f32,

    /// Final value of `beta`.
    pub beta_final: f32,

    /// Optimization steps after which `beta` equals `beta_final`.
    pub n_opts_final: usize,

    /// Optimization steps so far.
    #[serde(default)]
    pub n_opts: usize,
}

impl Default for IwScheduler {
    /// Constant `beta = 0.4`.
    fn default() -> Self {
        Self::constant(0.4)
    }
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_final: f32, n_opts_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_opts_final,
            n_opts: 0,
        }
    }

    /// A scheduler that always returns `beta`.
    pub fn constant(beta: f32) -> Self {
        Self::new(beta, beta, 0)
    }

    /// Current exponent.
    pub fn beta(&self) -> f32 {
        if self.n_opts >= self.n_opts_final {
            self.beta_final
        } else {
            let d = self.beta_final - self.beta_0;
            self.beta_0 + d * (self.n_opts as f32 / self.n_opts_final as f32)
        }
    }

    /// Counts an optimization step.
    pub fn add_n_opts(&mut self) {
        self.n_opts += 1;
    }
}
