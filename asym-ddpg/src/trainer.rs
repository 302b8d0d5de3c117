//! Train [`Ddpg`].
mod config;
use crate::{
    model::{ActorModel, CriticModel},
    Ddpg,
};
use anyhow::Result;
use asym_core::{
    comm::{all_reduce_mean_record, Communicator},
    record::{Record, RecordValue, Recorder},
    replay_buffer::Transition,
    util::mean_std,
    AsymError, DemoPolicy, Env,
};
pub use config::TrainerConfig;
use log::{info, warn};
use ndarray::Array1;
use std::{
    collections::VecDeque,
    fs::File,
    io::BufWriter,
    path::Path,
    time::SystemTime,
};

/// File name of the training environment state in the model directory.
pub const ENV_STATE_FILE: &str = "env_state.bin";

/// File name of the evaluation environment state in the model directory.
pub const EVAL_ENV_STATE_FILE: &str = "eval_env_state.bin";

fn mean(xs: &[f32]) -> f32 {
    mean_std(xs).0
}

fn push_history(history: &mut VecDeque<f32>, len: usize, v: f32) {
    history.push_back(v);
    while history.len() > len {
        history.pop_front();
    }
}

/// Environment used for demonstrations together with its expert.
pub type Demonstrator<'a, E> = (&'a mut E, &'a mut dyn DemoPolicy);

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop of [`Ddpg`].
///
/// # Training loop
///
/// 1. Check that the action space is symmetric, so that actions in `[-1, 1]` can be
///    scaled by `max_action = high`, and initialize the agent. Every worker of a
///    group runs the same loop.
///    * If `load_from_file` is set, load the parameters, run
///      `n_eval_only_episodes` noiseless episodes and return.
/// 2. Write the hyperparameters of the agent and the trainer at step 0.
/// 3. If a demonstrator is given, store `num_demo_steps` transitions of the expert
///    as demonstrations. Then seal the demonstration region.
/// 4. Run `num_pretrain_steps` optimization steps on demonstrations only, unless
///    there are fewer demonstrations than a batch.
/// 5. For every epoch and cycle:
///     1. `nb_rollout_steps` environment steps with exploration noise, storing the
///        transitions. Finished episodes are written as `"returns"`.
///     2. `nb_train_steps` optimization steps once the memory holds a batch,
///        adapting parameter noise every `param_noise_adaption_interval` steps.
///     3. On the first cycle, `nb_eval_steps` noiseless steps in the evaluation
///        environment.
/// 6. At the end of every epoch, average the statistics over workers. The root
///    worker writes them and saves the agent and the environment states to
///    `model_dir`.
/// 7. Checkpoint the agent.
///
/// ```mermaid
/// graph LR
///     A[Ddpg]-->|action|B[Env]
///     B -->|Transition|C[PrioritizedReplayBuffer]
///     D[DemoPolicy]-->|demonstration|C
///     C -->|TransitionBatch|A
/// ```
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Runs the training loop and returns the statistics of the last epoch.
    pub fn train<A, Q, C, E, R>(
        &self,
        agent: &mut Ddpg<A, Q, C>,
        env: &mut E,
        mut eval_env: Option<&mut E>,
        demonstrator: Option<Demonstrator<E>>,
        recorder: &mut R,
    ) -> Result<Record>
    where
        A: ActorModel,
        Q: CriticModel,
        C: Communicator,
        E: Env,
        R: Recorder + ?Sized,
    {
        let cfg = &self.config;
        cfg.validate()?;
        let spaces = env.spaces();
        agent.config().replay_buffer.dims.check(&spaces.transition_dims())?;
        if !spaces.action.is_symmetric() {
            return Err(AsymError::Precondition(format!(
                "action space must be symmetric, got low = {}, high = {}",
                spaces.action.low, spaces.action.high
            ))
            .into());
        }
        let max_action = spaces.action.high.clone();
        info!("Scaling actions by {} before executing in env", max_action);
        let is_root = agent.comm().is_root();

        agent.initialize()?;
        if let Some(path) = &cfg.load_from_file {
            agent.load_params(path)?;
            return self.evaluate_only(agent, env, &max_action, recorder);
        }

        if is_root {
            recorder.write(0, agent.summary().merge(self.summary(&*env, demonstrator.is_some())));
        }

        if let Some((demo_env, demo_policy)) = demonstrator {
            self.collect_demonstrations(agent, demo_env, demo_policy)?;
        }
        agent.demonstrations_done()?;

        let mut iteration = 0;
        self.pretrain(agent, &mut iteration, recorder)?;

        agent.reset();
        let mut obs = env.reset()?;
        let mut goal = env.goal_state();
        let mut goal_obs = env.goal_obs();
        let mut eval_obs = match eval_env.as_mut() {
            Some(e) => Some(e.reset()?),
            None => None,
        };

        let batch_size = agent.config().batch_size;
        let start_time = SystemTime::now();
        let mut t = 0usize;
        let mut episodes = 0usize;
        let mut eval_episodes = 0usize;
        let mut episode_reward = 0f32;
        let mut episode_step = 0usize;
        let mut episode_rewards_history = VecDeque::with_capacity(cfg.history_len);
        let mut eval_episode_rewards_history = VecDeque::with_capacity(cfg.history_len);
        let mut last_record = Record::empty();

        for epoch in 0..cfg.nb_epochs {
            let mut epoch_episode_rewards = vec![];
            let mut epoch_episode_steps = vec![];
            let mut epoch_actions = vec![];
            let mut epoch_qs = vec![];
            let mut epoch_episodes = 0usize;
            let mut epoch_actor_losses = vec![];
            let mut epoch_critic_losses = vec![];
            let mut epoch_adaptive_distances = vec![];
            let mut eval_episode_rewards = vec![];
            let mut eval_qs = vec![];

            for cycle in 0..cfg.nb_epoch_cycles {
                // Rollouts
                for _ in 0..cfg.nb_rollout_steps {
                    let state = env.get_state();
                    let aux = env.get_aux();
                    let (action, q) = agent.pi(&obs, &aux, Some((&state, &goal)), true)?;
                    if is_root && cfg.render {
                        env.render()?;
                    }
                    let step = env.step(&(&action * &max_action))?;
                    t += 1;
                    episode_reward += step.reward;
                    episode_step += 1;
                    epoch_actions.extend(action.iter().copied());
                    epoch_qs.extend(q);

                    let tr = Transition {
                        state,
                        obs: obs.clone(),
                        act: action,
                        reward: step.reward,
                        next_state: env.get_state(),
                        next_obs: step.obs.clone(),
                        is_terminated: step.is_done,
                        goal: goal.clone(),
                        goal_obs: goal_obs.clone(),
                        aux,
                        next_aux: env.get_aux(),
                    };
                    agent.store_transition(tr, false)?;
                    obs = step.obs;

                    if step.is_done {
                        if is_root {
                            recorder.write(episodes as _, Record::from_scalar("returns", episode_reward));
                        }
                        epoch_episode_rewards.push(episode_reward);
                        push_history(&mut episode_rewards_history, cfg.history_len, episode_reward);
                        epoch_episode_steps.push(episode_step as f32);
                        episode_reward = 0.0;
                        episode_step = 0;
                        epoch_episodes += 1;
                        episodes += 1;

                        agent.reset();
                        obs = env.reset()?;
                        goal = env.goal_state();
                        goal_obs = env.goal_obs();
                    }
                }

                // Training
                for t_train in 0..cfg.nb_train_steps {
                    if agent.memory_len() < batch_size {
                        break;
                    }
                    if t_train % cfg.param_noise_adaption_interval == 0 {
                        epoch_adaptive_distances.push(agent.adapt_param_noise()?);
                    }
                    let (cl, al, record) = agent.train_with_record(iteration, false)?;
                    if is_root {
                        recorder.write(iteration as _, record);
                    }
                    iteration += 1;
                    epoch_critic_losses.push(cl);
                    epoch_actor_losses.push(al);
                    agent.update_target_net();
                }

                // Evaluation
                if let (Some(eval_env), Some(eval_obs), 0) = (eval_env.as_mut(), eval_obs.as_mut(), cycle) {
                    let mut eval_episode_reward = 0f32;
                    for _ in 0..cfg.nb_eval_steps {
                        let state = eval_env.get_state();
                        let goal = eval_env.goal_state();
                        let aux = eval_env.get_aux();
                        let (action, q) = agent.pi(eval_obs, &aux, Some((&state, &goal)), false)?;
                        let step = eval_env.step(&(&action * &max_action))?;
                        if is_root && cfg.render_eval {
                            eval_env.render()?;
                        }
                        *eval_obs = step.obs;
                        eval_episode_reward += step.reward;
                        eval_qs.extend(q);

                        if step.is_done {
                            *eval_obs = eval_env.reset()?;
                            eval_episode_rewards.push(eval_episode_reward);
                            push_history(
                                &mut eval_episode_rewards_history,
                                cfg.history_len,
                                eval_episode_reward,
                            );
                            if is_root {
                                recorder.write(
                                    eval_episodes as _,
                                    Record::from_scalar("returns_eval", eval_episode_reward),
                                );
                            }
                            eval_episodes += 1;
                            eval_episode_reward = 0.0;
                        }
                    }
                }
            }

            // Statistics of the epoch
            let duration = start_time.elapsed()?.as_secs_f32();
            let mut record = if agent.memory_len() >= batch_size {
                agent.get_stats()?
            } else {
                Record::empty()
            };
            let (actions_mean, actions_std) = mean_std(&epoch_actions);
            let history = episode_rewards_history.iter().copied().collect::<Vec<_>>();
            for (k, v) in [
                ("rollout/return", mean(&epoch_episode_rewards)),
                ("rollout/return_history", mean(&history)),
                ("rollout/episode_steps", mean(&epoch_episode_steps)),
                ("rollout/actions_mean", actions_mean),
                ("rollout/actions_std", actions_std),
                ("rollout/Q_mean", mean(&epoch_qs)),
                ("rollout/episodes", epoch_episodes as f32),
                ("train/loss_actor", mean(&epoch_actor_losses)),
                ("train/loss_critic", mean(&epoch_critic_losses)),
                ("train/param_noise_distance", mean(&epoch_adaptive_distances)),
                ("total/duration", duration),
                ("total/steps_per_second", t as f32 / duration.max(f32::EPSILON)),
                ("total/episodes", episodes as f32),
            ] {
                record.insert_scalar(k, v);
            }
            if eval_env.is_some() {
                let history = eval_episode_rewards_history.iter().copied().collect::<Vec<_>>();
                record.insert_scalar("eval/return", mean(&eval_episode_rewards));
                record.insert_scalar("eval/return_history", mean(&history));
                record.insert_scalar("eval/Q_mean", mean(&eval_qs));
                record.insert_scalar("eval/episodes", eval_episode_rewards.len() as f32);
            }

            let mut record = all_reduce_mean_record(agent.comm(), record)?;
            record.insert_scalar("total/epochs", (epoch + 1) as f32);
            record.insert_scalar("total/steps", t as f32);

            if is_root {
                for k in record.sorted_scalar_keys() {
                    info!("{:<32} {}", k, record.get_scalar(&k)?);
                }
                recorder.write(epoch as _, record.clone());
                if let Some(model_dir) = &cfg.model_dir {
                    agent.save_params(model_dir)?;
                    Self::save_env_state(&*env, model_dir, ENV_STATE_FILE)?;
                    if let Some(eval_env) = eval_env.as_ref() {
                        Self::save_env_state(&**eval_env, model_dir, EVAL_ENV_STATE_FILE)?;
                    }
                }
            }
            last_record = record;
        }

        if let (true, Some(model_dir)) = (is_root, &cfg.model_dir) {
            agent.checkpoint(model_dir)?;
        }
        Ok(last_record)
    }

    /// Hyperparameters of the training loop.
    fn summary<E: Env>(&self, env: &E, has_demonstrator: bool) -> Record {
        let cfg = &self.config;
        let spaces = env.spaces();
        let mut record = Record::empty();
        record.insert("run_name", RecordValue::String(cfg.run_name.clone()));
        record.insert("demo_policy", RecordValue::String(format!("{}", has_demonstrator)));
        for (k, v) in [
            ("obs_dim", spaces.obs_dim),
            ("action_dim", spaces.action.dim()),
            ("aux_dim", spaces.aux_dim),
            ("state_dim", spaces.state_dim),
            ("num_demo_steps", cfg.num_demo_steps),
            ("nb_train_steps", cfg.nb_train_steps),
            ("nb_rollout_steps", cfg.nb_rollout_steps),
            ("num_pretrain_steps", cfg.num_pretrain_steps),
            ("nb_epochs", cfg.nb_epochs),
            ("nb_epoch_cycles", cfg.nb_epoch_cycles),
        ] {
            record.insert_scalar(k, v as f32);
        }
        record
    }

    /// Stores transitions of the expert as demonstrations.
    ///
    /// Expert actions are divided by the action bound of the demonstration
    /// environment, so that they live in the range of the actor.
    fn collect_demonstrations<A, Q, C, E>(
        &self,
        agent: &mut Ddpg<A, Q, C>,
        demo_env: &mut E,
        demo_policy: &mut dyn DemoPolicy,
    ) -> Result<()>
    where
        A: ActorModel,
        Q: CriticModel,
        C: Communicator,
        E: Env,
    {
        info!("Start collecting demo transitions");
        let max_action = demo_env.spaces().action.high;
        let mut obs = demo_env.reset()?;
        demo_policy.reset();
        let mut goal = demo_env.goal_state();
        let mut goal_obs = demo_env.goal_obs();

        for _ in 0..self.config.num_demo_steps {
            let aux = demo_env.get_aux();
            let state = demo_env.get_state();
            let action = demo_policy.choose_action(&state)?;
            let step = demo_env.step(&action)?;
            let tr = Transition {
                state,
                obs,
                act: &action / &max_action,
                reward: step.reward,
                next_state: demo_env.get_state(),
                next_obs: step.obs.clone(),
                is_terminated: step.is_done,
                goal: goal.clone(),
                goal_obs: goal_obs.clone(),
                aux,
                next_aux: demo_env.get_aux(),
            };
            agent.store_transition(tr, true)?;
            obs = step.obs;

            if step.is_done {
                obs = demo_env.reset()?;
                demo_policy.reset();
                goal = demo_env.goal_state();
                goal_obs = demo_env.goal_obs();
            }
        }
        info!("Collected {} demo transitions", agent.num_demonstrations());
        Ok(())
    }

    /// Optimizes the agent on demonstrations only.
    fn pretrain<A, Q, C, R>(
        &self,
        agent: &mut Ddpg<A, Q, C>,
        iteration: &mut usize,
        recorder: &mut R,
    ) -> Result<()>
    where
        A: ActorModel,
        Q: CriticModel,
        C: Communicator,
        R: Recorder + ?Sized,
    {
        let n = self.config.num_pretrain_steps;
        if n == 0 {
            return Ok(());
        }
        let batch_size = agent.config().batch_size;
        if agent.num_demonstrations() < batch_size {
            warn!(
                "Skipped pretraining: {} demonstrations, batch size {}",
                agent.num_demonstrations(),
                batch_size
            );
            return Ok(());
        }

        info!("Pretraining for {} steps", n);
        let is_root = agent.comm().is_root();
        for t in 1..=n {
            if agent.memory_len() >= batch_size && t % self.config.param_noise_adaption_interval == 0 {
                agent.adapt_param_noise()?;
            }
            let (_, _, record) = agent.train_with_record(*iteration, true)?;
            if is_root {
                recorder.write(*iteration as _, record);
            }
            *iteration += 1;
            agent.update_target_net();
        }
        Ok(())
    }

    /// Runs noiseless episodes with loaded parameters.
    fn evaluate_only<A, Q, C, E, R>(
        &self,
        agent: &mut Ddpg<A, Q, C>,
        env: &mut E,
        max_action: &Array1<f32>,
        recorder: &mut R,
    ) -> Result<Record>
    where
        A: ActorModel,
        Q: CriticModel,
        C: Communicator,
        E: Env,
        R: Recorder + ?Sized,
    {
        info!("Evaluation only, {} episodes", self.config.n_eval_only_episodes);
        let is_root = agent.comm().is_root();
        let mut returns = vec![];
        for episode in 0..self.config.n_eval_only_episodes {
            let mut obs = env.reset()?;
            agent.reset();
            let mut total_r = 0f32;
            loop {
                let aux = env.get_aux();
                let (action, _) = agent.pi(&obs, &aux, None, false)?;
                let step = env.step(&(&action * max_action))?;
                if is_root && self.config.render_eval {
                    env.render()?;
                }
                total_r += step.reward;
                obs = step.obs;
                if step.is_done {
                    break;
                }
            }
            info!("Episode {}: return = {}", episode, total_r);
            if is_root {
                recorder.write(episode as _, Record::from_scalar("returns_eval", total_r));
            }
            returns.push(total_r);
        }

        let mut record = Record::empty();
        record.insert_scalar("eval/return", mean(&returns));
        record.insert_scalar("eval/episodes", returns.len() as f32);
        Ok(record)
    }

    fn save_env_state<E: Env>(env: &E, model_dir: impl AsRef<Path>, file: &str) -> Result<()> {
        let path = model_dir.as_ref().join(file);
        let writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(writer, &env.get_state().to_vec())?;
        Ok(())
    }
}
