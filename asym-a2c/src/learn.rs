//! Training and evaluation loops.
use crate::{util::explained_variance, A2cConfig, A2cModel, ActorCriticModel, Runner, VecEnv};
use anyhow::Result;
use asym_core::{
    record::{Record, Recorder},
    AsymError,
};
use log::info;
use rand::rngs::StdRng;
use std::{path::PathBuf, time::SystemTime};

/// File name of the snapshot taken after `timesteps` environment steps.
pub fn snapshot_file(timesteps: usize) -> String {
    format!("snapshot_{:09}.bin", timesteps)
}

/// Trains `model` for `total_timesteps / (num_envs * nsteps)` updates.
///
/// The first update and every `log_interval`-th update are written to `recorder`
/// with the keys `nupdates`, `total_timesteps`, `fps`, `policy_entropy`,
/// `value_loss`, `explained_variance` and `t`. If `save_timesteps` and
/// `model_dir` are set, the parameters are saved every `save_timesteps` steps.
/// The environment is closed at the end.
pub fn learn<M, E, R>(
    model: M,
    env: &mut E,
    config: &A2cConfig,
    rng: StdRng,
    recorder: &mut R,
) -> Result<A2cModel<M>>
where
    M: ActorCriticModel,
    E: VecEnv,
    R: Recorder + ?Sized,
{
    let mut model = A2cModel::build(model, config)?;
    if let Some(path) = &config.load_snapshot {
        model.load(path)?;
        info!("Loading snapshot: {}", path);
    }

    let nbatch = env.num_envs() * config.nsteps;
    if nbatch == 0 {
        return Err(AsymError::Precondition("no environments to run".into()).into());
    }
    let save_timesteps = match config.save_timesteps.map(|s| s / nbatch * nbatch) {
        Some(0) => {
            return Err(AsymError::Precondition(format!(
                "save_timesteps must be at least the batch size {}",
                nbatch
            ))
            .into())
        }
        s => s,
    };

    let mut runner = Runner::new(env, config.nsteps, config.gamma, rng)?;
    let tstart = SystemTime::now();
    for update in 1..=config.total_timesteps / nbatch {
        let ustart = SystemTime::now();
        let timesteps = update * nbatch;
        let rollout = runner.run(&model)?;
        let (_, value_loss, policy_entropy) = model.train(
            rollout.obs.view(),
            rollout.rewards.view(),
            &rollout.actions,
            rollout.values.view(),
        )?;
        let nseconds = tstart.elapsed()?.as_secs_f32();

        if update % config.log_interval == 0 || update == 1 {
            let useconds = ustart.elapsed()?.as_secs_f32();
            let ev = explained_variance(rollout.values.view(), rollout.rewards.view());
            let mut record = Record::empty();
            for (k, v) in [
                ("nupdates", update as f32),
                ("total_timesteps", timesteps as f32),
                ("fps", (nbatch as f32 / useconds.max(f32::EPSILON)).floor()),
                ("policy_entropy", policy_entropy),
                ("value_loss", value_loss),
                ("explained_variance", ev),
                ("t", nseconds),
            ] {
                record.insert_scalar(k, v);
            }
            info!(
                "update {}: timesteps = {}, entropy = {:.6}, value_loss = {:.6}, ev = {:.6}",
                update, timesteps, policy_entropy, value_loss, ev
            );
            recorder.write(update as _, record);
        }

        if let (Some(s), Some(dir)) = (save_timesteps, &config.model_dir) {
            if timesteps % s == 0 {
                let path = PathBuf::from(dir).join(snapshot_file(timesteps));
                info!("Saving snapshot: {:?}", path);
                model.save(path)?;
            }
        }
    }

    env.close()?;
    Ok(model)
}

/// Collects rollouts with a trained model while `step_condition` holds and returns
/// the number of rollouts.
///
/// Nothing is learned: the rollouts only drive the environments, for example to
/// record videos.
pub fn eval_policy<M, E, F>(
    model: M,
    env: &mut E,
    config: &A2cConfig,
    rng: StdRng,
    mut step_condition: F,
) -> Result<usize>
where
    M: ActorCriticModel,
    E: VecEnv,
    F: FnMut() -> bool,
{
    let mut model = A2cModel::build(model, config)?;
    if let Some(path) = &config.load_snapshot {
        model.load(path)?;
        info!("Loading snapshot: {}", path);
    }

    let mut runner = Runner::new(env, config.nsteps, config.gamma, rng)?;
    let mut n = 0;
    while step_condition() {
        runner.run(&model)?;
        n += 1;
    }

    env.close()?;
    Ok(n)
}
