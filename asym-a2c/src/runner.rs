//! Collects n-step rollouts from vectorized environments.
use crate::{util::discount_with_dones, A2cModel, ActorCriticModel, VecEnv};
use anyhow::Result;
use asym_core::AsymError;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;

/// `nenvs * nsteps` samples ordered environment-major: sample `e * nsteps + t` is
/// step `t` of environment `e`.
#[derive(Clone, Debug)]
pub struct Rollout {
    pub obs: Array2<f32>,
    /// Discounted returns, bootstrapped with the value of the last observation
    /// unless the last step ended an episode.
    pub rewards: Array1<f32>,
    /// Whether the observation starts a new episode.
    pub masks: Vec<bool>,
    pub actions: Vec<usize>,
    pub values: Array1<f32>,
}

impl Rollout {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Steps a [`VecEnv`] with the actions of an [`A2cModel`].
pub struct Runner<'a, E> {
    env: &'a mut E,
    obs: Array2<f32>,
    dones: Vec<bool>,
    nsteps: usize,
    gamma: f32,
    rng: StdRng,
}

impl<'a, E: VecEnv> Runner<'a, E> {
    /// Resets the environments. `rng` drives action sampling.
    pub fn new(env: &'a mut E, nsteps: usize, gamma: f32, rng: StdRng) -> Result<Self> {
        let obs = env.reset()?;
        if obs.nrows() != env.num_envs() {
            return Err(AsymError::shape("observations", env.num_envs(), obs.nrows()).into());
        }
        let dones = vec![false; env.num_envs()];
        Ok(Self {
            env,
            obs,
            dones,
            nsteps,
            gamma,
            rng,
        })
    }

    pub fn num_envs(&self) -> usize {
        self.dones.len()
    }

    /// Runs `nsteps` steps in every environment.
    pub fn run<M: ActorCriticModel>(&mut self, model: &A2cModel<M>) -> Result<Rollout> {
        let (nenvs, nsteps) = (self.num_envs(), self.nsteps);
        let mut mb_obs = Vec::with_capacity(nsteps);
        let mut mb_rewards = Vec::with_capacity(nsteps);
        let mut mb_actions = Vec::with_capacity(nsteps);
        let mut mb_values = Vec::with_capacity(nsteps);
        let mut mb_dones = Vec::with_capacity(nsteps + 1);

        for _ in 0..nsteps {
            let (actions, values) = model.step(self.obs.view(), &mut self.rng)?;
            mb_obs.push(self.obs.clone());
            mb_dones.push(self.dones.clone());
            let step = self.env.step(&actions)?;
            if step.rewards.len() != nenvs || step.dones.len() != nenvs {
                return Err(AsymError::shape("step", nenvs, step.rewards.len()).into());
            }
            mb_actions.push(actions);
            mb_values.push(values);
            mb_rewards.push(step.rewards);
            self.obs = step.obs;
            self.dones = step.dones;
        }
        mb_dones.push(self.dones.clone());
        let last_values = model.value(self.obs.view())?;

        // Step-major to environment-major.
        let obs_dim = self.obs.ncols();
        let mut obs = Array2::zeros((nenvs * nsteps, obs_dim));
        for e in 0..nenvs {
            for (t, o) in mb_obs.iter().enumerate() {
                obs.row_mut(e * nsteps + t).assign(&o.row(e));
            }
        }

        let mut rewards = Vec::with_capacity(nenvs * nsteps);
        let mut masks = Vec::with_capacity(nenvs * nsteps);
        let mut actions = Vec::with_capacity(nenvs * nsteps);
        let mut values = Vec::with_capacity(nenvs * nsteps);
        for e in 0..nenvs {
            let mut r = (0..nsteps).map(|t| mb_rewards[t][e]).collect::<Vec<_>>();
            let mut d = (1..=nsteps).map(|t| mb_dones[t][e]).collect::<Vec<_>>();
            let discounted = if d.last() == Some(&false) {
                r.push(last_values[e]);
                d.push(false);
                let mut x = discount_with_dones(&r, &d, self.gamma);
                x.pop();
                x
            } else {
                discount_with_dones(&r, &d, self.gamma)
            };
            rewards.extend(discounted);
            masks.extend((0..nsteps).map(|t| mb_dones[t][e]));
            actions.extend((0..nsteps).map(|t| mb_actions[t][e]));
            values.extend((0..nsteps).map(|t| mb_values[t][e]));
        }

        Ok(Rollout {
            obs,
            rewards: Array1::from(rewards),
            masks,
            actions,
            values: Array1::from(values),
        })
    }
}
