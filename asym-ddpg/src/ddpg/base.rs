//! DDPG agent with demonstrations and prioritized n-step replay.
use super::{checkpoint::DdpgCheckpoint, DdpgConfig};
use crate::model::{ActorModel, CriticInput, CriticModel, ModelBuilder, ParamModel};
use anyhow::Result;
use asym_core::{
    comm::Communicator,
    noise::{ActionNoise, AdaptiveParamNoise},
    opt::{clip_by_global_norm, Adam, SyncOptimizer},
    record::{Record, RecordValue},
    replay_buffer::{IwScheduler, PrioritizedReplayBuffer, Transition, TransitionBatch},
    running_stats::RunningMeanStd,
    util::{mean_std, track},
    AsymError,
};
use log::{debug, info, trace};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use rand::{rngs::StdRng, SeedableRng};
use std::path::Path;

/// Lifecycle of [`Ddpg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Built, parameters not yet synchronized.
    Uninitialized,

    /// Parameters synchronized or loaded.
    Initialized,

    /// At least one optimization step taken.
    Training,

    /// Saved for the last time; no further training.
    Checkpointed,
}

fn describe(x: impl std::fmt::Debug) -> RecordValue {
    RecordValue::String(format!("{:?}", x))
}

/// Losses of an optimization step.
struct Losses {
    critic: f32,
    actor: f32,
    one_step: f32,
    n_step: f32,
    pretrain: f32,
    margin_mean: f32,
    demos_better: f32,
}

/// DDPG agent with an asymmetric critic.
///
/// The actor sees observations and auxiliary features, the critic sees the full
/// state, the goal, the action and the auxiliary features. Transitions, including
/// demonstrations, are replayed from a [`PrioritizedReplayBuffer`]; the critic is
/// trained on 1-step and n-step TD errors plus a large-margin loss on
/// demonstrations.
///
/// All collective operations go through the communicator `C`, so every worker of a
/// group must call the same methods in the same order.
pub struct Ddpg<A, Q, C> {
    config: DdpgConfig,
    phase: Phase,
    comm: C,

    actor: A,
    target_actor: A,
    param_noise_actor: A,
    adaptive_param_noise_actor: A,
    critic: Q,
    target_critic: Q,

    actor_opt: SyncOptimizer<Adam>,
    critic_opt: SyncOptimizer<Adam>,

    memory: PrioritizedReplayBuffer,
    action_noise: Option<Box<dyn ActionNoise>>,
    param_noise: Option<AdaptiveParamNoise>,

    obs_rms: Option<RunningMeanStd>,
    state_rms: Option<RunningMeanStd>,
    aux_rms: Option<RunningMeanStd>,

    iw_scheduler: IwScheduler,
    stats_sample: Option<TransitionBatch>,
}

impl<A, Q, C> Ddpg<A, Q, C>
where
    A: ActorModel,
    Q: CriticModel,
    C: Communicator,
{
    /// Builds the agent.
    ///
    /// The builders are called once per network scope. Random sources of the
    /// memory and the noise processes are derived from `rng`.
    pub fn build(
        config: DdpgConfig,
        actor_builder: &impl ModelBuilder<A>,
        critic_builder: &impl ModelBuilder<Q>,
        comm: C,
        mut rng: StdRng,
    ) -> Result<Self> {
        if config.enable_popart {
            return Err(AsymError::NotImplemented("Pop-Art return normalization".into()).into());
        }
        config.validate()?;
        let dims = config.replay_buffer.dims;

        let actor = actor_builder.build("actor", &mut rng)?;
        let target_actor = actor_builder.build("target_actor", &mut rng)?;
        let param_noise_actor = actor_builder.build("param_noise_actor", &mut rng)?;
        let adaptive_param_noise_actor =
            actor_builder.build("adaptive_param_noise_actor", &mut rng)?;
        let critic = critic_builder.build("critic", &mut rng)?;
        let target_critic = critic_builder.build("target_critic", &mut rng)?;
        for m in [&target_actor, &param_noise_actor, &adaptive_param_noise_actor] {
            if m.num_params() != actor.num_params() {
                return Err(AsymError::shape(m.scope(), actor.num_params(), m.num_params()).into());
            }
        }
        if target_critic.num_params() != critic.num_params() {
            return Err(AsymError::shape(
                target_critic.scope(),
                critic.num_params(),
                target_critic.num_params(),
            )
            .into());
        }
        info!("actor params: {}", actor.num_params());
        info!("critic params: {}", critic.num_params());

        let adam = &config.adam;
        let actor_opt = SyncOptimizer::new(
            Adam::new(actor.num_params(), adam.beta1, adam.beta2, adam.epsilon),
            actor.num_params(),
        );
        let critic_opt = SyncOptimizer::new(
            Adam::new(critic.num_params(), adam.beta1, adam.beta2, adam.epsilon),
            critic.num_params(),
        );

        let memory =
            PrioritizedReplayBuffer::build(&config.replay_buffer, StdRng::from_rng(&mut rng)?)?;
        let action_noise = match &config.noise.action {
            Some(c) => Some(c.build(dims.act, StdRng::from_rng(&mut rng)?)),
            None => None,
        };
        let param_noise = match &config.noise.param {
            Some(c) => Some(AdaptiveParamNoise::new(c, StdRng::from_rng(&mut rng)?)),
            None => None,
        };

        let obs_rms = config.normalize_observations.then(|| RunningMeanStd::new(dims.obs));
        let state_rms = config.normalize_state.then(|| RunningMeanStd::new(dims.state));
        let aux_rms = config.normalize_aux.then(|| RunningMeanStd::new(dims.aux));

        Ok(Self {
            iw_scheduler: config.iw_scheduler.clone(),
            config,
            phase: Phase::Uninitialized,
            comm,
            actor,
            target_actor,
            param_noise_actor,
            adaptive_param_noise_actor,
            critic,
            target_critic,
            actor_opt,
            critic_opt,
            memory,
            action_noise,
            param_noise,
            obs_rms,
            state_rms,
            aux_rms,
            stats_sample: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &DdpgConfig {
        &self.config
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn target_actor(&self) -> &A {
        &self.target_actor
    }

    pub fn critic(&self) -> &Q {
        &self.critic
    }

    pub fn target_critic(&self) -> &Q {
        &self.target_critic
    }

    pub fn memory(&self) -> &PrioritizedReplayBuffer {
        &self.memory
    }

    /// Number of stored transitions.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn num_demonstrations(&self) -> usize {
        self.memory.num_demonstrations()
    }

    /// Number of optimization steps taken.
    pub fn n_opts(&self) -> usize {
        self.iw_scheduler.n_opts
    }

    fn ensure_trainable(&self, op: &str) -> Result<()> {
        match self.phase {
            Phase::Initialized | Phase::Training => Ok(()),
            Phase::Uninitialized => {
                Err(AsymError::Protocol(format!("{} called before initialize", op)).into())
            }
            Phase::Checkpointed => {
                Err(AsymError::Protocol(format!("{} called after checkpoint", op)).into())
            }
        }
    }

    /// Synchronizes the online networks from rank 0 and copies them to the targets.
    pub fn initialize(&mut self) -> Result<()> {
        if self.phase == Phase::Checkpointed {
            return Err(AsymError::Protocol("initialize called after checkpoint".into()).into());
        }
        self.actor_opt.sync(&self.comm, self.actor.params_mut())?;
        self.critic_opt.sync(&self.comm, self.critic.params_mut())?;
        track(self.target_actor.params_mut(), self.actor.params(), 1.0);
        track(self.target_critic.params_mut(), self.critic.params(), 1.0);
        self.perturb_actor();
        self.phase = Phase::Initialized;
        debug!("Agent initialized on rank {}/{}", self.comm.rank(), self.comm.size());
        Ok(())
    }

    fn perturb_actor(&mut self) {
        if let Some(noise) = self.param_noise.as_mut() {
            noise.perturb(
                self.actor.params(),
                &self.actor.perturbable(),
                self.param_noise_actor.params_mut(),
            );
        }
    }

    fn normalize(rms: &Option<RunningMeanStd>, x: &Array2<f32>, range: (f32, f32)) -> Array2<f32> {
        match rms {
            Some(rms) => rms.normalize(x.view(), range),
            None => x.mapv(|v| v.max(range.0).min(range.1)),
        }
    }

    fn norm_obs(&self, x: &Array2<f32>) -> Array2<f32> {
        Self::normalize(&self.obs_rms, x, self.config.observation_range)
    }

    fn norm_state(&self, x: &Array2<f32>) -> Array2<f32> {
        Self::normalize(&self.state_rms, x, self.config.state_range)
    }

    fn norm_aux(&self, x: &Array2<f32>) -> Array2<f32> {
        Self::normalize(&self.aux_rms, x, self.config.aux_range)
    }

    /// Stores a transition and updates the input normalizers.
    ///
    /// The normalizers are updated with the transitions of all workers.
    pub fn store_transition(&mut self, mut tr: Transition, demo: bool) -> Result<()> {
        tr.reward *= self.config.reward_scale;

        // [count, (sum, sumsq) per normalized input]
        let mut buf = vec![1.0f32];
        for (rms, x) in [
            (&self.obs_rms, &tr.obs),
            (&self.state_rms, &tr.state),
            (&self.aux_rms, &tr.aux),
        ] {
            if rms.is_some() {
                buf.extend(x.iter());
                buf.extend(x.iter().map(|v| v * v));
            }
        }
        let xs = [tr.obs.len(), tr.state.len(), tr.aux.len()];
        self.memory.append(tr, demo)?;

        if buf.len() > 1 {
            self.comm.all_reduce_sum(&mut buf)?;
            let count = buf[0] as f64;
            let mut offset = 1;
            for (rms, n) in [&mut self.obs_rms, &mut self.state_rms, &mut self.aux_rms]
                .into_iter()
                .zip(xs)
            {
                if let Some(rms) = rms {
                    let sum = buf[offset..offset + n].iter().map(|v| *v as f64).collect::<Array1<f64>>();
                    let sumsq = buf[offset + n..offset + 2 * n]
                        .iter()
                        .map(|v| *v as f64)
                        .collect::<Array1<f64>>();
                    rms.update_from_sums(count, sum.view(), sumsq.view());
                    offset += 2 * n;
                }
            }
        }
        Ok(())
    }

    /// Freezes the demonstration region of the memory.
    pub fn demonstrations_done(&mut self) -> Result<()> {
        info!("{} demonstrations stored", self.memory.num_demonstrations());
        self.memory.demonstrations_done()
    }

    /// Action for a single observation.
    ///
    /// Uses the perturbed actor when parameter noise is configured and `apply_noise`
    /// is set, then adds action noise and clips to `action_range`. When the
    /// critic-side inputs `(state, goal)` are given, also returns the value of the
    /// noiseless action.
    pub fn pi(
        &mut self,
        obs: &Array1<f32>,
        aux: &Array1<f32>,
        critic_input: Option<(&Array1<f32>, &Array1<f32>)>,
        apply_noise: bool,
    ) -> Result<(Array1<f32>, Option<f32>)> {
        let obs = self.norm_obs(&obs.clone().insert_axis(Axis(0)));
        let aux = self.norm_aux(&aux.clone().insert_axis(Axis(0)));

        let clean = self.actor.forward(obs.view(), aux.view())?;
        let action = if self.param_noise.is_some() && apply_noise {
            self.param_noise_actor.forward(obs.view(), aux.view())?
        } else {
            clean.clone()
        };

        let q = match critic_input {
            Some((state, goal)) => {
                let state = self.norm_state(&state.clone().insert_axis(Axis(0)));
                let goal = goal.clone().insert_axis(Axis(0));
                let input = CriticInput {
                    state: state.view(),
                    goal: goal.view(),
                    act: clean.view(),
                    aux: aux.view(),
                };
                Some(self.critic.forward(&input)?[0])
            }
            None => None,
        };

        let mut action = action.row(0).to_owned();
        if apply_noise {
            if let Some(noise) = self.action_noise.as_mut() {
                let n = noise.sample();
                if n.len() != action.len() {
                    return Err(AsymError::shape("action noise", action.len(), n.len()).into());
                }
                action += &n;
            }
        }
        let (lo, hi) = self.config.action_range;
        action.mapv_inplace(|v| v.max(lo).min(hi));
        Ok((action, q))
    }

    /// TD targets `r + (1 - terminal) gamma^steps Q'(s', pi'(o', aux'))`.
    #[allow(clippy::too_many_arguments)]
    fn td_target(
        &self,
        obs1: &Array2<f32>,
        aux1: &Array2<f32>,
        states1: &Array2<f32>,
        goals: &Array2<f32>,
        rewards: &Array1<f32>,
        terminals1: &Array1<f32>,
        steps: &Array1<f32>,
    ) -> Result<Array1<f32>> {
        let obs1 = self.norm_obs(obs1);
        let aux1 = self.norm_aux(aux1);
        let states1 = self.norm_state(states1);
        let act1 = self.target_actor.forward(obs1.view(), aux1.view())?;
        let q1 = self.target_critic.forward(&CriticInput {
            state: states1.view(),
            goal: goals.view(),
            act: act1.view(),
            aux: aux1.view(),
        })?;
        if q1.len() != rewards.len() {
            return Err(AsymError::shape("target critic output", rewards.len(), q1.len()).into());
        }

        let gamma = self.config.gamma;
        let mut y = Zip::from(rewards)
            .and(terminals1)
            .and(steps)
            .and(&q1)
            .map_collect(|r, t, n, q| r + (1.0 - t) * gamma.powf(*n) * q);
        if let Some((lo, hi)) = self.config.return_range {
            y.mapv_inplace(|v| v.max(lo).min(hi));
        }
        Ok(y)
    }

    /// Runs one optimization step and returns `(critic_loss, actor_loss)`.
    pub fn train(&mut self, iteration: usize, pretrain: bool) -> Result<(f32, f32)> {
        let (critic_loss, actor_loss, _) = self.train_with_record(iteration, pretrain)?;
        Ok((critic_loss, actor_loss))
    }

    /// Runs one optimization step and also returns a summary of its losses.
    ///
    /// With `pretrain`, the batch is drawn from demonstrations only.
    pub fn train_with_record(&mut self, iteration: usize, pretrain: bool) -> Result<(f32, f32, Record)> {
        self.ensure_trainable("train")?;
        let beta = self.iw_scheduler.beta();
        let (batch, nstep_batch) = self.memory.sample_rollout(
            self.config.batch_size,
            self.config.nsteps,
            beta,
            self.config.gamma,
            pretrain,
        )?;
        let y1 = self.td_target(
            &batch.obs1,
            &batch.aux1,
            &batch.states1,
            &batch.goals,
            &batch.rewards,
            &batch.terminals1,
            &batch.step_reached,
        )?;
        let yn = self.td_target(
            &nstep_batch.obs1,
            &nstep_batch.aux1,
            &nstep_batch.states1,
            &nstep_batch.goals,
            &nstep_batch.rewards,
            &nstep_batch.terminals1,
            &nstep_batch.step_reached,
        )?;

        let (losses, td_errors, mut critic_grad, mut actor_grad) =
            self.losses_and_grads(&batch, &y1, &yn)?;

        if let Some(clip_norm) = self.config.clip_norm {
            clip_by_global_norm(&mut critic_grad, clip_norm);
            clip_by_global_norm(&mut actor_grad, clip_norm);
        }

        self.memory.update_priorities(&batch.idxes, &td_errors)?;
        self.actor_opt.update(
            &self.comm,
            self.actor.params_mut(),
            &actor_grad,
            self.config.actor_lr,
        )?;
        self.critic_opt.update(
            &self.comm,
            self.critic.params_mut(),
            &critic_grad,
            self.config.critic_lr,
        )?;
        self.iw_scheduler.add_n_opts();
        self.phase = Phase::Training;
        trace!(
            "iteration {}: critic_loss = {}, actor_loss = {}",
            iteration,
            losses.critic,
            losses.actor
        );

        let mut record = Record::empty();
        record.insert_scalar("critic_loss", losses.critic);
        record.insert_scalar("actor_loss", losses.actor);
        record.insert_scalar("1step_loss", losses.one_step);
        record.insert_scalar("nstep_loss", losses.n_step);
        record.insert_scalar("pretrain_loss", losses.pretrain);
        record.insert_scalar(
            "percentage_of_demonstrations",
            batch.demos.sum() / self.config.batch_size as f32,
        );
        record.insert_scalar("margin_func_mean", losses.margin_mean);
        record.insert_scalar("number_of_demos_better_than_actor", losses.demos_better);
        record.insert_scalar("beta", beta);
        Ok((losses.critic, losses.actor, record))
    }

    /// Losses, priorities and local gradients of critic and actor for a batch.
    fn losses_and_grads(
        &self,
        batch: &TransitionBatch,
        y1: &Array1<f32>,
        yn: &Array1<f32>,
    ) -> Result<(Losses, Vec<f32>, Vec<f32>, Vec<f32>)> {
        let cfg = &self.config;
        let b = batch.len() as f32;
        let act_dim = batch.actions.ncols().max(1) as f32;

        let obs0 = self.norm_obs(&batch.obs0);
        let aux0 = self.norm_aux(&batch.aux0);
        let state0 = self.norm_state(&batch.states0);
        let pi = self.actor.forward(obs0.view(), aux0.view())?;
        if pi.dim() != batch.actions.dim() {
            return Err(AsymError::shape("actor output", batch.actions.len(), pi.len()).into());
        }
        let input_a = CriticInput {
            state: state0.view(),
            goal: batch.goals.view(),
            act: batch.actions.view(),
            aux: aux0.view(),
        };
        let input_pi = CriticInput {
            act: pi.view(),
            ..input_a
        };
        let q = self.critic.forward(&input_a)?;
        let q_pi = self.critic.forward(&input_pi)?;
        if q.len() != batch.len() || q_pi.len() != batch.len() {
            return Err(AsymError::shape("critic output", batch.len(), q.len()).into());
        }

        let w = &batch.weights;
        let demo = &batch.demos;
        let d1 = &q - y1;
        let dn = &q - yn;
        let one_step = cfg.lambda_1step * (w * &d1.mapv(|v| v * v)).sum() / b;
        let n_step = cfg.lambda_nstep * (w * &dn.mapv(|v| v * v)).sum() / b;
        let td_errors = Zip::from(&d1)
            .and(&dn)
            .map_collect(|a, b| a * a + b * b)
            .to_vec();

        // Large-margin loss on demonstrations.
        let action_diffs = (&batch.actions - &pi).mapv(|v| v * v).sum_axis(Axis(1)) / act_dim;
        let margin = Zip::from(demo)
            .and(&action_diffs)
            .map_collect(|m, d| m * cfg.margin_limit * d * d / (d * d + cfg.margin_tolerance));
        let gap = &q_pi + &margin - &q;
        let active = Zip::from(demo)
            .and(&gap)
            .map_collect(|m, g| if *m > 0.0 && *g > 0.0 { *m } else { 0.0 });
        let demo_norm = demo.sum() + 1e-6;
        let c = cfg.lambda_pretrain / demo_norm;
        let pretrain = c * (&active * &gap).sum();

        let reg_mask = self.critic.regularizable();
        let l2 = 0.5
            * cfg.critic_l2_reg
            * self
                .critic
                .params()
                .iter()
                .zip(reg_mask.iter())
                .filter(|(_, m)| **m)
                .map(|(p, _)| p * p)
                .sum::<f32>();
        let critic_loss = one_step + n_step + pretrain + l2;

        let demo_better = Zip::from(demo)
            .and(&q)
            .and(&q_pi)
            .map_collect(|m, q, q_pi| if *m > 0.0 && q < q_pi { *m } else { 0.0 });
        let mut actor_loss = -q_pi.sum() / b;
        if cfg.actor_demo_loss {
            actor_loss += (&demo_better * &action_diffs).sum() / demo_norm;
        }

        // Critic gradient through both critic evaluations.
        let d_q = Zip::from(w)
            .and(&d1)
            .and(&dn)
            .and(&active)
            .map_collect(|w, d1, dn, a| {
                2.0 * w / b * (cfg.lambda_1step * d1 + cfg.lambda_nstep * dn) - c * a
            });
        let d_q_pi = &active * c;
        let mut critic_grad = self.critic.backward(&input_a, d_q.view())?.params;
        let grad_pi = self.critic.backward(&input_pi, d_q_pi.view())?.params;
        if critic_grad.len() != self.critic.num_params() || grad_pi.len() != critic_grad.len() {
            return Err(AsymError::shape(
                "critic gradient",
                self.critic.num_params(),
                critic_grad.len(),
            )
            .into());
        }
        for (((g, gp), p), m) in critic_grad
            .iter_mut()
            .zip(grad_pi.iter())
            .zip(self.critic.params().iter())
            .zip(reg_mask.iter())
        {
            *g += gp;
            if *m {
                *g += cfg.critic_l2_reg * p;
            }
        }

        // Actor gradient through the critic.
        let d_q_actor = Array1::from_elem(batch.len(), -1.0 / b);
        let mut d_act = self.critic.backward(&input_pi, d_q_actor.view())?.act;
        if cfg.actor_demo_loss {
            for (i, mut row) in d_act.axis_iter_mut(Axis(0)).enumerate() {
                let coef = demo_better[i] / demo_norm;
                if coef == 0.0 {
                    continue;
                }
                for (j, g) in row.iter_mut().enumerate() {
                    *g += coef * 2.0 * (pi[[i, j]] - batch.actions[[i, j]]) / act_dim;
                }
            }
        }
        let actor_grad = self.actor.backward(obs0.view(), aux0.view(), d_act.view())?;
        if actor_grad.len() != self.actor.num_params() {
            return Err(
                AsymError::shape("actor gradient", self.actor.num_params(), actor_grad.len()).into(),
            );
        }

        let losses = Losses {
            critic: critic_loss,
            actor: actor_loss,
            one_step,
            n_step,
            pretrain,
            margin_mean: margin.mean().unwrap_or(0.0),
            demos_better: demo_better.sum(),
        };
        Ok((losses, td_errors, critic_grad, actor_grad))
    }

    /// Moves the target networks towards the online networks by `tau`.
    pub fn update_target_net(&mut self) {
        let tau = self.config.tau;
        track(self.target_actor.params_mut(), self.actor.params(), tau);
        track(self.target_critic.params_mut(), self.critic.params(), tau);
    }

    /// Adapts the scale of the parameter noise and returns the measured distance.
    ///
    /// The distance is the RMS difference between the actions of the actor and of a
    /// perturbed copy on a fresh sample, averaged over workers. Returns `0` without
    /// parameter noise.
    pub fn adapt_param_noise(&mut self) -> Result<f32> {
        if self.param_noise.is_none() {
            return Ok(0.0);
        }
        self.ensure_trainable("adapt_param_noise")?;
        let noise = match self.param_noise.as_mut() {
            Some(noise) => noise,
            None => return Ok(0.0),
        };
        noise.perturb(
            self.actor.params(),
            &self.actor.perturbable(),
            self.adaptive_param_noise_actor.params_mut(),
        );

        let batch = self.memory.sample(self.config.batch_size, 0.4)?;
        let obs0 = self.norm_obs(&batch.obs0);
        let aux0 = self.norm_aux(&batch.aux0);
        let act = self.actor.forward(obs0.view(), aux0.view())?;
        let act_perturbed = self.adaptive_param_noise_actor.forward(obs0.view(), aux0.view())?;
        let distance = (&act - &act_perturbed).mapv(|v| v * v).mean().unwrap_or(0.0).sqrt();

        let mut buf = [distance];
        self.comm.all_reduce_mean(&mut buf)?;
        let mean_distance = buf[0];
        if let Some(noise) = self.param_noise.as_mut() {
            noise.adapt(mean_distance);
            debug!(
                "param noise distance = {}, stddev = {}",
                mean_distance,
                noise.current_stddev()
            );
        }
        Ok(mean_distance)
    }

    /// Resets the noise processes at the start of an episode.
    pub fn reset(&mut self) {
        if let Some(noise) = self.action_noise.as_mut() {
            noise.reset();
        }
        self.perturb_actor();
    }

    /// Statistics of the networks on a sample fixed at the first call.
    pub fn get_stats(&mut self) -> Result<Record> {
        if self.stats_sample.is_none() {
            self.stats_sample = Some(self.memory.sample(self.config.batch_size, 0.4)?);
        }
        let batch = match self.stats_sample.as_ref() {
            Some(batch) => batch,
            None => return Ok(Record::empty()),
        };

        let mut record = Record::empty();
        for (name, rms) in [
            ("obs_rms", &self.obs_rms),
            ("state_rms", &self.state_rms),
            ("aux_rms", &self.aux_rms),
        ] {
            if let Some(rms) = rms {
                record.insert_scalar(format!("{}_mean", name), rms.mean().mean().unwrap_or(0.0));
                record.insert_scalar(format!("{}_std", name), rms.std().mean().unwrap_or(0.0));
            }
        }

        let obs0 = self.norm_obs(&batch.obs0);
        let aux0 = self.norm_aux(&batch.aux0);
        let state0 = self.norm_state(&batch.states0);
        let pi = self.actor.forward(obs0.view(), aux0.view())?;
        let input_a = CriticInput {
            state: state0.view(),
            goal: batch.goals.view(),
            act: batch.actions.view(),
            aux: aux0.view(),
        };
        let q = self.critic.forward(&input_a)?;
        let q_pi = self.critic.forward(&CriticInput {
            act: pi.view(),
            ..input_a
        })?;

        let mut insert = |name: &str, xs: ArrayView1<f32>| {
            let (mean, std) = mean_std(&xs.to_vec());
            record.insert_scalar(format!("{}_mean", name), mean);
            record.insert_scalar(format!("{}_std", name), std);
        };
        insert("reference_Q", q.view());
        insert("reference_actor_Q", q_pi.view());
        insert("reference_action", Array1::from_iter(pi.iter().copied()).view());
        if let Some(noise) = self.param_noise.as_ref() {
            let perturbed = self.param_noise_actor.forward(obs0.view(), aux0.view())?;
            insert(
                "reference_perturbed_action",
                Array1::from_iter(perturbed.iter().copied()).view(),
            );
            record.merge_inplace(noise.get_stats());
        }
        Ok(record)
    }

    /// Hyperparameters of the agent.
    pub fn summary(&self) -> Record {
        let c = &self.config;
        let mut record = Record::empty();
        for (k, v) in [
            ("gamma", c.gamma),
            ("tau", c.tau),
            ("actor_lr", c.actor_lr),
            ("critic_lr", c.critic_lr),
            ("reward_scale", c.reward_scale),
            ("batch_size", c.batch_size as f32),
            ("critic_l2_reg", c.critic_l2_reg),
            ("lambda_1step", c.lambda_1step),
            ("lambda_nstep", c.lambda_nstep),
            ("lambda_pretrain", c.lambda_pretrain),
            ("nsteps", c.nsteps as f32),
            ("beta", self.iw_scheduler.beta()),
            ("margin_limit", c.margin_limit),
            ("margin_tolerance", c.margin_tolerance),
        ] {
            record.insert_scalar(k, v);
        }
        record.insert("normalize_observations", describe(&c.normalize_observations));
        record.insert("normalize_state", describe(&c.normalize_state));
        record.insert("normalize_aux", describe(&c.normalize_aux));
        record.insert("enable_popart", describe(&c.enable_popart));
        record.insert("actor_demo_loss", describe(&c.actor_demo_loss));
        record.insert("observation_range", describe(&c.observation_range));
        record.insert("state_range", describe(&c.state_range));
        record.insert("aux_range", describe(&c.aux_range));
        record.insert("action_range", describe(&c.action_range));
        record.insert("return_range", describe(&c.return_range));
        record.insert("clip_norm", describe(&c.clip_norm));
        record.insert(
            "action_noise",
            RecordValue::String(match &self.action_noise {
                Some(n) => n.describe(),
                None => "None".into(),
            }),
        );
        record.insert(
            "param_noise",
            RecordValue::String(match &self.param_noise {
                Some(n) => n.describe(),
                None => "None".into(),
            }),
        );
        record
    }

    fn snapshot(&self) -> DdpgCheckpoint {
        DdpgCheckpoint {
            actor: self.actor.params().to_vec(),
            target_actor: self.target_actor.params().to_vec(),
            critic: self.critic.params().to_vec(),
            target_critic: self.target_critic.params().to_vec(),
            actor_opt: self.actor_opt.clone(),
            critic_opt: self.critic_opt.clone(),
            obs_rms: self.obs_rms.clone(),
            state_rms: self.state_rms.clone(),
            aux_rms: self.aux_rms.clone(),
            param_noise_stddev: self.param_noise.as_ref().map(|n| n.current_stddev()),
            n_opts: self.iw_scheduler.n_opts,
        }
    }

    /// Saves parameters, optimizer and normalizer states to `<dir>/agent.bin`.
    pub fn save_params(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.snapshot().save(dir)
    }

    /// Saves the agent for the last time. Training is not possible afterwards.
    pub fn checkpoint(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        self.save_params(dir)?;
        self.phase = Phase::Checkpointed;
        Ok(())
    }

    /// Restores the state saved by [`Self::save_params`].
    pub fn load_params(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let ckpt = DdpgCheckpoint::load(dir)?;
        Self::restore(&mut self.actor, &ckpt.actor)?;
        Self::restore(&mut self.target_actor, &ckpt.target_actor)?;
        Self::restore(&mut self.critic, &ckpt.critic)?;
        Self::restore(&mut self.target_critic, &ckpt.target_critic)?;
        self.actor_opt = ckpt.actor_opt;
        self.critic_opt = ckpt.critic_opt;
        self.obs_rms = ckpt.obs_rms;
        self.state_rms = ckpt.state_rms;
        self.aux_rms = ckpt.aux_rms;
        if let (Some(noise), Some(stddev)) = (self.param_noise.as_mut(), ckpt.param_noise_stddev) {
            noise.set_current_stddev(stddev);
        }
        self.iw_scheduler.n_opts = ckpt.n_opts;
        self.perturb_actor();
        self.phase = Phase::Initialized;
        Ok(())
    }

    fn restore<M: ParamModel>(model: &mut M, params: &[f32]) -> Result<()> {
        if model.num_params() != params.len() {
            return Err(AsymError::shape(model.scope(), model.num_params(), params.len()).into());
        }
        model.params_mut().copy_from_slice(params);
        Ok(())
    }
}
