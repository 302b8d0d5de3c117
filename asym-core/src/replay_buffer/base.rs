//! Prioritized replay memory with a protected demonstration region.
mod iw_scheduler;
mod sum_tree;
use super::{ReplayBufferConfig, Transition, TransitionBatch, TransitionDims};
use crate::error::AsymError;
use anyhow::Result;
pub use iw_scheduler::IwScheduler;
use log::{debug, trace};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use sum_tree::SumTree;

/// Column storage of transitions.
struct Columns {
    state: Array2<f32>,
    obs: Array2<f32>,
    act: Array2<f32>,
    reward: Vec<f32>,
    next_state: Array2<f32>,
    next_obs: Array2<f32>,
    is_terminated: Vec<bool>,
    goal: Array2<f32>,
    goal_obs: Array2<f32>,
    aux: Array2<f32>,
    next_aux: Array2<f32>,
    demo: Vec<bool>,
}

impl Columns {
    fn new(n: usize, dims: &TransitionDims) -> Self {
        Self {
            state: Array2::zeros((n, dims.state)),
            obs: Array2::zeros((n, dims.obs)),
            act: Array2::zeros((n, dims.act)),
            reward: vec![0.0; n],
            next_state: Array2::zeros((n, dims.state)),
            next_obs: Array2::zeros((n, dims.obs)),
            is_terminated: vec![false; n],
            goal: Array2::zeros((n, dims.goal)),
            goal_obs: Array2::zeros((n, dims.goal_obs)),
            aux: Array2::zeros((n, dims.aux)),
            next_aux: Array2::zeros((n, dims.aux)),
            demo: vec![false; n],
        }
    }

    fn put(&mut self, ix: usize, tr: Transition, demo: bool) {
        self.state.row_mut(ix).assign(&tr.state);
        self.obs.row_mut(ix).assign(&tr.obs);
        self.act.row_mut(ix).assign(&tr.act);
        self.reward[ix] = tr.reward;
        self.next_state.row_mut(ix).assign(&tr.next_state);
        self.next_obs.row_mut(ix).assign(&tr.next_obs);
        self.is_terminated[ix] = tr.is_terminated;
        self.goal.row_mut(ix).assign(&tr.goal);
        self.goal_obs.row_mut(ix).assign(&tr.goal_obs);
        self.aux.row_mut(ix).assign(&tr.aux);
        self.next_aux.row_mut(ix).assign(&tr.next_aux);
        self.demo[ix] = demo;
    }
}

/// Prioritized replay memory.
///
/// Indices `[0, n_demo)` hold demonstrations, inserted before any agent-collected
/// transition and never evicted. The following `capacity` slots form a ring buffer
/// of online transitions, overwriting the oldest one when full. Sampling is
/// proportional to `priority^alpha`; new transitions get the largest priority in the
/// memory (`1.0` when empty).
///
/// ```rust
/// use asym_core::replay_buffer::{
///     PrioritizedReplayBuffer, ReplayBufferConfig, Transition, TransitionDims,
/// };
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let dims = TransitionDims::new(2, 2, 1, 0);
/// let config = ReplayBufferConfig::default().capacity(8).dims(dims);
/// let mut memory = PrioritizedReplayBuffer::build(&config, StdRng::seed_from_u64(0)).unwrap();
/// memory.append(Transition::zeros(&dims), true).unwrap();
/// memory.demonstrations_done().unwrap();
/// memory.append(Transition::zeros(&dims), false).unwrap();
/// assert_eq!(memory.len(), 2);
/// assert_eq!(memory.num_demonstrations(), 1);
/// ```
pub struct PrioritizedReplayBuffer {
    capacity: usize,
    eps: f32,
    dims: TransitionDims,

    /// Number of demonstrations, the start of the online region.
    n_demo: usize,

    /// Number of online transitions.
    n_online: usize,

    /// Offset of the next online write in the online region.
    next_idx: usize,

    sealed: bool,
    columns: Columns,
    sum_tree: SumTree,
    rng: StdRng,
}

impl PrioritizedReplayBuffer {
    /// Builds an empty memory. `rng` drives sampling.
    pub fn build(config: &ReplayBufferConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;
        Ok(Self {
            capacity,
            eps: config.eps,
            dims: config.dims,
            n_demo: 0,
            n_online: 0,
            next_idx: 0,
            sealed: false,
            columns: Columns::new(2 * capacity, &config.dims),
            sum_tree: SumTree::new(2 * capacity, config.alpha),
            rng,
        })
    }

    /// Number of stored transitions, demonstrations included.
    pub fn len(&self) -> usize {
        self.n_demo + self.n_online
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of online transitions kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_demonstrations(&self) -> usize {
        self.n_demo
    }

    /// Returns `true` once [`Self::demonstrations_done`] has been called.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn dims(&self) -> &TransitionDims {
        &self.dims
    }

    /// Largest priority in the memory.
    pub fn max_priority(&self) -> Option<f32> {
        self.sum_tree.max(self.len())
    }

    /// Smallest priority in the memory.
    pub fn min_priority(&self) -> Option<f32> {
        self.sum_tree.min(self.len())
    }

    /// Priority of the transition at `ix`.
    pub fn priority(&self, ix: usize) -> Result<f32> {
        self.check_index(ix)?;
        Ok(self.sum_tree.priority(ix))
    }

    /// Sum of `priority^alpha` over the memory.
    pub fn total_priority(&self) -> f32 {
        self.sum_tree.prefix_sum(self.len())
    }

    /// Returns `true` if the transition at `ix` is a demonstration.
    pub fn is_demonstration(&self, ix: usize) -> Result<bool> {
        self.check_index(ix)?;
        Ok(self.columns.demo[ix])
    }

    /// Reward of the transition at `ix`.
    pub fn reward(&self, ix: usize) -> Result<f32> {
        self.check_index(ix)?;
        Ok(self.columns.reward[ix])
    }

    fn check_index(&self, ix: usize) -> Result<()> {
        if ix >= self.len() {
            return Err(AsymError::Index { ix, len: self.len() }.into());
        }
        Ok(())
    }

    /// Inserts a transition.
    ///
    /// Demonstrations (`demo == true`) must come before any online transition and
    /// before the memory is sealed.
    pub fn append(&mut self, tr: Transition, demo: bool) -> Result<usize> {
        tr.check_dims(&self.dims)?;
        let p = self.max_priority().unwrap_or(1.0);

        let ix = if demo {
            if self.sealed {
                return Err(AsymError::Protocol(
                    "demonstrations cannot be added after demonstrations_done".into(),
                )
                .into());
            }
            if self.n_online > 0 {
                return Err(AsymError::Protocol(
                    "demonstrations must be added before online transitions".into(),
                )
                .into());
            }
            if self.n_demo + 1 > self.capacity {
                return Err(AsymError::Capacity {
                    demos: self.n_demo + 1,
                    capacity: self.capacity,
                }
                .into());
            }
            self.n_demo += 1;
            self.n_demo - 1
        } else {
            let ix = self.n_demo + self.next_idx;
            self.next_idx = (self.next_idx + 1) % self.capacity;
            self.n_online = (self.n_online + 1).min(self.capacity);
            ix
        };

        trace!("append transition at {} (demo = {})", ix, demo);
        self.columns.put(ix, tr, demo);
        self.sum_tree.update(ix, p);
        Ok(ix)
    }

    /// Freezes the demonstration region.
    pub fn demonstrations_done(&mut self) -> Result<()> {
        if self.sealed {
            return Err(AsymError::Protocol("demonstrations_done called twice".into()).into());
        }
        if self.n_online > 0 {
            return Err(AsymError::Protocol(
                "demonstrations_done called after online transitions were added".into(),
            )
            .into());
        }
        debug!("Demonstration region sealed with {} transitions", self.n_demo);
        self.sealed = true;
        Ok(())
    }

    /// Sets priorities to `|td_error| + eps`.
    pub fn update_priorities(&mut self, idxes: &[usize], td_errors: &[f32]) -> Result<()> {
        if idxes.len() != td_errors.len() {
            return Err(AsymError::shape("td_errors", idxes.len(), td_errors.len()).into());
        }
        for (&ix, &td) in idxes.iter().zip(td_errors.iter()) {
            self.check_index(ix)?;
            if !td.is_finite() {
                return Err(AsymError::Precondition(format!(
                    "td error of transition {} is not finite: {}",
                    ix, td
                ))
                .into());
            }
        }
        for (&ix, &td) in idxes.iter().zip(td_errors.iter()) {
            self.sum_tree.update(ix, td.abs() + self.eps);
        }
        Ok(())
    }

    /// Index following `ix` within its episode storage, if any.
    fn successor(&self, ix: usize) -> Option<usize> {
        if ix < self.n_demo {
            return (ix + 1 < self.n_demo).then(|| ix + 1);
        }
        let next = (ix - self.n_demo + 1) % self.capacity;
        (next != self.next_idx && next < self.n_online).then(|| self.n_demo + next)
    }

    /// Draws indices and their normalized importance weights.
    fn sample_indices(
        &mut self,
        batch_size: usize,
        beta: f32,
        pretrain: bool,
    ) -> Result<(Vec<usize>, Array1<f32>)> {
        let n = if pretrain { self.n_demo } else { self.len() };
        if n < batch_size || batch_size == 0 {
            return Err(AsymError::InsufficientData {
                requested: batch_size,
                available: n,
            }
            .into());
        }

        let idxes = self.sum_tree.sample(n, batch_size, &mut self.rng);
        let mass = self.sum_tree.prefix_sum(n);
        let weights = idxes
            .iter()
            .map(|&ix| (n as f32 * self.sum_tree.leaf(ix) / mass).powf(-beta))
            .collect::<Array1<f32>>();
        let w_max = weights.iter().copied().fold(f32::MIN, f32::max);
        Ok((idxes, weights / w_max))
    }

    fn gather(&self, idxes: &[usize], weights: Array1<f32>) -> TransitionBatch {
        let c = &self.columns;
        TransitionBatch {
            obs0: c.obs.select(Axis(0), idxes),
            obs1: c.next_obs.select(Axis(0), idxes),
            states0: c.state.select(Axis(0), idxes),
            states1: c.next_state.select(Axis(0), idxes),
            actions: c.act.select(Axis(0), idxes),
            rewards: idxes.iter().map(|&ix| c.reward[ix]).collect(),
            terminals1: idxes
                .iter()
                .map(|&ix| c.is_terminated[ix] as i32 as f32)
                .collect(),
            aux0: c.aux.select(Axis(0), idxes),
            aux1: c.next_aux.select(Axis(0), idxes),
            goals: c.goal.select(Axis(0), idxes),
            goal_obs: c.goal_obs.select(Axis(0), idxes),
            weights,
            demos: idxes.iter().map(|&ix| c.demo[ix] as i32 as f32).collect(),
            step_reached: Array1::ones(idxes.len()),
            idxes: idxes.to_vec(),
        }
    }

    /// Samples a 1-step batch.
    pub fn sample(&mut self, batch_size: usize, beta: f32) -> Result<TransitionBatch> {
        let (idxes, weights) = self.sample_indices(batch_size, beta, false)?;
        Ok(self.gather(&idxes, weights))
    }

    /// Samples co-indexed 1-step and n-step batches.
    ///
    /// The n-step lookahead from index `i` sums `gamma^k r_{i+k}` over at most `nsteps`
    /// consecutive transitions, stopping after a terminal transition, at the end of
    /// the demonstration region or at the newest online transition. With `pretrain`,
    /// only demonstrations are sampled.
    pub fn sample_rollout(
        &mut self,
        batch_size: usize,
        nsteps: usize,
        beta: f32,
        gamma: f32,
        pretrain: bool,
    ) -> Result<(TransitionBatch, TransitionBatch)> {
        let (idxes, weights) = self.sample_indices(batch_size, beta, pretrain)?;
        let one_step = self.gather(&idxes, weights);
        let n_step = self.nstep_batch(&one_step, nsteps.max(1), gamma);
        Ok((one_step, n_step))
    }

    fn nstep_batch(&self, one_step: &TransitionBatch, nsteps: usize, gamma: f32) -> TransitionBatch {
        let c = &self.columns;
        let mut batch = one_step.clone();

        let mut last = Vec::with_capacity(one_step.len());
        for (k, &ix) in one_step.idxes.iter().enumerate() {
            let mut j = ix;
            let mut reward = 0f32;
            let mut discount = 1f32;
            let mut steps = 0;
            let mut terminal = false;
            loop {
                reward += discount * c.reward[j];
                steps += 1;
                if c.is_terminated[j] {
                    terminal = true;
                    break;
                }
                if steps == nsteps {
                    break;
                }
                match self.successor(j) {
                    Some(next) => {
                        discount *= gamma;
                        j = next;
                    }
                    None => break,
                }
            }
            batch.rewards[k] = reward;
            batch.terminals1[k] = terminal as i32 as f32;
            batch.step_reached[k] = steps as f32;
            last.push(j);
        }

        batch.obs1 = c.next_obs.select(Axis(0), &last);
        batch.states1 = c.next_state.select(Axis(0), &last);
        batch.aux1 = c.next_aux.select(Axis(0), &last);
        batch
    }
}
