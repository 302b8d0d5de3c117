//! A contextual bandit and a linear actor-critic for tests.
#![allow(dead_code)]
use anyhow::Result;
use asym_a2c::{ActorCriticModel, VecEnv, VecStep};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const N_CONTEXTS: usize = 2;

/// Each environment shows a one-hot context and pays 1 for choosing the action
/// with the same index. Episodes last `episode_len` steps.
pub struct BanditEnv {
    contexts: Vec<usize>,
    t: Vec<usize>,
    episode_len: usize,
    rng: StdRng,
    pub n_steps: usize,
    pub closed: bool,
}

impl BanditEnv {
    pub fn new(num_envs: usize, episode_len: usize, seed: u64) -> Self {
        Self {
            contexts: vec![0; num_envs],
            t: vec![0; num_envs],
            episode_len,
            rng: StdRng::seed_from_u64(seed),
            n_steps: 0,
            closed: false,
        }
    }

    fn obs(&self) -> Array2<f32> {
        let mut obs = Array2::zeros((self.contexts.len(), N_CONTEXTS));
        for (e, &c) in self.contexts.iter().enumerate() {
            obs[[e, c]] = 1.0;
        }
        obs
    }
}

impl VecEnv for BanditEnv {
    fn num_envs(&self) -> usize {
        self.contexts.len()
    }

    fn reset(&mut self) -> Result<Array2<f32>> {
        for e in 0..self.contexts.len() {
            self.contexts[e] = self.rng.gen_range(0..N_CONTEXTS);
            self.t[e] = 0;
        }
        Ok(self.obs())
    }

    fn step(&mut self, actions: &[usize]) -> Result<VecStep> {
        self.n_steps += 1;
        let mut rewards = Array1::zeros(actions.len());
        let mut dones = vec![false; actions.len()];
        for (e, &a) in actions.iter().enumerate() {
            rewards[e] = (a == self.contexts[e]) as i32 as f32;
            self.t[e] += 1;
            if self.t[e] == self.episode_len {
                dones[e] = true;
                self.t[e] = 0;
            }
            self.contexts[e] = self.rng.gen_range(0..N_CONTEXTS);
        }
        Ok(VecStep {
            obs: self.obs(),
            rewards,
            dones,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// `logits = W obs + b`, `value = v . obs + c`.
pub struct LinearActorCritic {
    pub params: Vec<f32>,
    n_obs: usize,
    n_act: usize,
}

impl LinearActorCritic {
    pub fn new(n_obs: usize, n_act: usize) -> Self {
        Self {
            params: vec![0.0; n_act * n_obs + n_act + n_obs + 1],
            n_obs,
            n_act,
        }
    }

    fn split(&self) -> (ArrayView2<f32>, ArrayView1<f32>, ArrayView1<f32>, f32) {
        let (no, na) = (self.n_obs, self.n_act);
        let p = &self.params;
        let w = ArrayView2::from_shape((na, no), &p[..na * no]).unwrap();
        let b = ArrayView1::from(&p[na * no..na * no + na]);
        let v = ArrayView1::from(&p[na * no + na..na * no + na + no]);
        (w, b, v, p[p.len() - 1])
    }

    /// Probability of the greedy action being the matching one, per context.
    pub fn accuracy(&self) -> Result<Array1<f32>> {
        let obs = Array2::eye(N_CONTEXTS);
        let (logits, _) = self.forward(obs.view())?;
        let logp = asym_a2c::util::log_softmax(logits.view());
        Ok((0..N_CONTEXTS).map(|c| logp[[c, c]].exp()).collect())
    }
}

impl ActorCriticModel for LinearActorCritic {
    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn num_actions(&self) -> usize {
        self.n_act
    }

    fn forward(&self, obs: ArrayView2<f32>) -> Result<(Array2<f32>, Array1<f32>)> {
        let (w, b, v, c) = self.split();
        Ok((obs.dot(&w.t()) + &b, obs.dot(&v) + c))
    }

    fn backward(
        &self,
        obs: ArrayView2<f32>,
        d_logits: ArrayView2<f32>,
        d_values: ArrayView1<f32>,
    ) -> Result<Vec<f32>> {
        let dw = d_logits.t().dot(&obs);
        let db = d_logits.sum_axis(Axis(0));
        let dv = obs.t().dot(&d_values);
        let dc = d_values.sum();
        Ok(dw
            .iter()
            .chain(db.iter())
            .chain(dv.iter())
            .copied()
            .chain(std::iter::once(dc))
            .collect())
    }
}
