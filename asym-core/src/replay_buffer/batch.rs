use ndarray::{Array1, Array2};

/// A batch of transitions sampled from the memory.
///
/// Row `k` of every field belongs to the transition at `idxes[k]`. For an n-step
/// batch, `rewards` holds the discounted reward sum, the `*1` fields come from the
/// last transition reached and `step_reached` the number of transitions summed.
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    pub obs0: Array2<f32>,
    pub obs1: Array2<f32>,
    pub states0: Array2<f32>,
    pub states1: Array2<f32>,
    pub actions: Array2<f32>,
    pub rewards: Array1<f32>,
    /// `1.0` for terminal transitions.
    pub terminals1: Array1<f32>,
    pub aux0: Array2<f32>,
    pub aux1: Array2<f32>,
    pub goals: Array2<f32>,
    pub goal_obs: Array2<f32>,
    /// Importance-sampling weights, normalized by the batch maximum.
    pub weights: Array1<f32>,
    /// `1.0` for demonstrations.
    pub demos: Array1<f32>,
    pub step_reached: Array1<f32>,
    pub idxes: Vec<usize>,
}

impl TransitionBatch {
    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.idxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idxes.is_empty()
    }

    /// Fraction of demonstrations in the batch.
    pub fn demo_fraction(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.demos.sum() / self.len() as f32
        }
    }
}
