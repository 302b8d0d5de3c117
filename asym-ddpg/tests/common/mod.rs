//! Linear models and a point-reaching environment for tests.
#![allow(dead_code)]
use anyhow::Result;
use asym_core::{
    record::Record,
    replay_buffer::{ReplayBufferConfig, Transition, TransitionDims},
    BoxSpace, DemoPolicy, Env, EnvSpaces, Step,
};
use asym_ddpg::{
    model::{ActorModel, CriticGrad, CriticInput, CriticModel, ParamModel},
    DdpgConfig,
};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const OBS_DIM: usize = 2;
pub const STATE_DIM: usize = 2;
pub const ACT_DIM: usize = 2;
pub const AUX_DIM: usize = 1;
pub const MAX_ACTION: f32 = 0.1;

pub fn dims() -> TransitionDims {
    TransitionDims::new(STATE_DIM, OBS_DIM, ACT_DIM, AUX_DIM)
}

fn init(n: usize, rng: &mut StdRng) -> Vec<f32> {
    let normal = Normal::new(0.0f32, 0.1).unwrap();
    (0..n).map(|_| normal.sample(rng)).collect()
}

/// `a = tanh(W [obs, aux] + b)`.
pub struct LinearActor {
    scope: String,
    n_in: usize,
    n_out: usize,
    params: Vec<f32>,
}

impl LinearActor {
    pub fn build(scope: &str, rng: &mut StdRng) -> Result<Self> {
        let (n_in, n_out) = (OBS_DIM + AUX_DIM, ACT_DIM);
        Ok(Self {
            scope: scope.to_string(),
            n_in,
            n_out,
            params: init(n_out * n_in + n_out, rng),
        })
    }

    fn weights(&self) -> (ArrayView2<f32>, ArrayView1<f32>) {
        let n_w = self.n_in * self.n_out;
        let w = ArrayView2::from_shape((self.n_out, self.n_in), &self.params[..n_w]).unwrap();
        let b = ArrayView1::from(&self.params[n_w..]);
        (w, b)
    }

    fn input(obs: ArrayView2<f32>, aux: ArrayView2<f32>) -> Array2<f32> {
        concatenate![Axis(1), obs, aux]
    }
}

impl ParamModel for LinearActor {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn regularizable(&self) -> Vec<bool> {
        let n_w = self.n_in * self.n_out;
        (0..self.params.len()).map(|i| i < n_w).collect()
    }
}

impl ActorModel for LinearActor {
    fn forward(&self, obs: ArrayView2<f32>, aux: ArrayView2<f32>) -> Result<Array2<f32>> {
        let x = Self::input(obs, aux);
        let (w, b) = self.weights();
        Ok((x.dot(&w.t()) + &b).mapv(f32::tanh))
    }

    fn backward(
        &self,
        obs: ArrayView2<f32>,
        aux: ArrayView2<f32>,
        d_act: ArrayView2<f32>,
    ) -> Result<Vec<f32>> {
        let x = Self::input(obs, aux);
        let a = self.forward(obs, aux)?;
        let dz = &d_act * &a.mapv(|v| 1.0 - v * v);
        let dw = dz.t().dot(&x);
        let db = dz.sum_axis(Axis(0));
        Ok(dw.iter().chain(db.iter()).copied().collect())
    }
}

/// `q = w_s . state + w_g . goal + w_a . act + w_x . aux + b`.
pub struct LinearCritic {
    scope: String,
    params: Vec<f32>,
}

const CRITIC_SIZES: [usize; 4] = [STATE_DIM, STATE_DIM, ACT_DIM, AUX_DIM];

impl LinearCritic {
    pub fn build(scope: &str, rng: &mut StdRng) -> Result<Self> {
        let n = CRITIC_SIZES.iter().sum::<usize>() + 1;
        Ok(Self {
            scope: scope.to_string(),
            params: init(n, rng),
        })
    }

    fn input(input: &CriticInput) -> Array2<f32> {
        concatenate![Axis(1), input.state, input.goal, input.act, input.aux]
    }

    fn act_weights(&self) -> ArrayView1<f32> {
        let o = STATE_DIM * 2;
        ArrayView1::from(&self.params[o..o + ACT_DIM])
    }
}

impl ParamModel for LinearCritic {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn regularizable(&self) -> Vec<bool> {
        let n = self.params.len();
        (0..n).map(|i| i + 1 < n).collect()
    }
}

impl CriticModel for LinearCritic {
    fn forward(&self, input: &CriticInput) -> Result<Array1<f32>> {
        let x = Self::input(input);
        let n = self.params.len();
        let w = ArrayView1::from(&self.params[..n - 1]);
        Ok(x.dot(&w) + self.params[n - 1])
    }

    fn backward(&self, input: &CriticInput, d_q: ArrayView1<f32>) -> Result<CriticGrad> {
        let x = Self::input(input);
        let dw = x.t().dot(&d_q);
        let db = d_q.sum();
        let params = dw.iter().copied().chain(std::iter::once(db)).collect();
        let act = d_q
            .insert_axis(Axis(1))
            .dot(&self.act_weights().insert_axis(Axis(0)));
        Ok(CriticGrad { params, act })
    }
}

/// A point in the unit square moving towards a fixed goal.
///
/// The reward is the negative distance to the goal; episodes end at the goal or
/// after `max_steps` steps.
pub struct PointEnv {
    pos: Array1<f32>,
    goal: Array1<f32>,
    t: usize,
    max_steps: usize,
    bound: f32,
    act_dim: usize,
    rng: StdRng,
}

impl PointEnv {
    pub fn new(seed: u64) -> Self {
        Self {
            pos: Array1::zeros(STATE_DIM),
            goal: Array1::from_elem(STATE_DIM, 0.5),
            t: 0,
            max_steps: 10,
            bound: MAX_ACTION,
            act_dim: ACT_DIM,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// An environment with the action space `[0, bound]`.
    pub fn asymmetric(seed: u64) -> Self {
        Self {
            bound: -1.0,
            ..Self::new(seed)
        }
    }

    /// An environment advertising `act_dim` action components.
    pub fn with_action_dim(seed: u64, act_dim: usize) -> Self {
        Self {
            act_dim,
            ..Self::new(seed)
        }
    }

    fn distance(&self) -> f32 {
        (&self.pos - &self.goal).mapv(|v| v * v).sum().sqrt()
    }
}

impl Env for PointEnv {
    fn reset(&mut self) -> Result<Array1<f32>> {
        self.t = 0;
        self.pos = (0..STATE_DIM).map(|_| self.rng.gen::<f32>()).collect();
        Ok(self.pos.clone())
    }

    fn step(&mut self, act: &Array1<f32>) -> Result<Step> {
        let bound = self.bound.abs();
        self.pos = (&self.pos + &act.mapv(|v| v.max(-bound).min(bound))).mapv(|v| v.max(0.0).min(1.0));
        self.t += 1;
        let d = self.distance();
        Ok(Step {
            obs: self.pos.clone(),
            reward: -d,
            is_done: d < 0.05 || self.t >= self.max_steps,
            info: Record::empty(),
        })
    }

    fn get_state(&self) -> Array1<f32> {
        self.pos.clone()
    }

    fn get_aux(&self) -> Array1<f32> {
        Array1::from_elem(AUX_DIM, self.t as f32 / self.max_steps as f32)
    }

    fn goal_state(&self) -> Array1<f32> {
        self.goal.clone()
    }

    fn goal_obs(&self) -> Array1<f32> {
        self.goal.clone()
    }

    fn spaces(&self) -> EnvSpaces {
        let action = if self.bound > 0.0 {
            BoxSpace::symmetric(self.act_dim, self.bound)
        } else {
            BoxSpace::new(
                Array1::zeros(self.act_dim),
                Array1::from_elem(self.act_dim, -self.bound),
            )
        };
        EnvSpaces {
            action,
            obs_dim: OBS_DIM,
            state_dim: STATE_DIM,
            aux_dim: AUX_DIM,
            goal_dim: STATE_DIM,
            goal_obs_dim: OBS_DIM,
        }
    }
}

/// Moves straight to the goal at full speed.
pub struct GreedyPolicy {
    pub goal: Array1<f32>,
    pub n_resets: usize,
}

impl GreedyPolicy {
    pub fn new() -> Self {
        Self {
            goal: Array1::from_elem(STATE_DIM, 0.5),
            n_resets: 0,
        }
    }
}

impl DemoPolicy for GreedyPolicy {
    fn reset(&mut self) {
        self.n_resets += 1;
    }

    fn choose_action(&mut self, state: &Array1<f32>) -> Result<Array1<f32>> {
        Ok((&self.goal - state).mapv(|v| v.max(-MAX_ACTION).min(MAX_ACTION)))
    }
}

/// Configuration for small tests.
pub fn ddpg_config() -> DdpgConfig {
    DdpgConfig::default()
        .batch_size(8)
        .nsteps(3)
        .tau(0.01)
        .observation_range(-5.0, 5.0)
        .lambda_pretrain(1.0)
        .replay_buffer(ReplayBufferConfig::default().capacity(256).dims(dims()))
}

/// A random transition.
pub fn random_transition(rng: &mut StdRng, is_terminated: bool) -> Transition {
    let mut tr = Transition::zeros(&dims());
    for v in [
        &mut tr.state,
        &mut tr.obs,
        &mut tr.act,
        &mut tr.next_state,
        &mut tr.next_obs,
        &mut tr.goal,
        &mut tr.goal_obs,
        &mut tr.aux,
        &mut tr.next_aux,
    ] {
        v.mapv_inplace(|_| rng.gen_range(-1.0..1.0));
    }
    tr.reward = rng.gen_range(-1.0..0.0);
    tr.is_terminated = is_terminated;
    tr
}
