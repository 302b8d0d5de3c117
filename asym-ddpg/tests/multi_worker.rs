mod common;
use anyhow::Result;
use asym_core::{
    comm::{ChannelCommunicator, Communicator},
    noise::{NoiseConfig, ParamNoiseConfig},
};
use asym_ddpg::{model::ParamModel, Ddpg};
use common::{ddpg_config, random_transition, LinearActor, LinearCritic};
use rand::{rngs::StdRng, SeedableRng};
use std::thread;
use test_log::test;

struct Outcome {
    actor: Vec<u32>,
    critic: Vec<u32>,
    target_critic: Vec<u32>,
    obs_rms_mean: f32,
    param_noise_stddev: f32,
}

fn bits(xs: &[f32]) -> Vec<u32> {
    xs.iter().map(|x| x.to_bits()).collect()
}

fn run_worker(comm: ChannelCommunicator) -> Result<Outcome> {
    let rank = comm.rank() as u64;
    let noise = NoiseConfig::default().param(Some(ParamNoiseConfig::default()));
    let mut agent = Ddpg::build(
        ddpg_config().noise(noise),
        &LinearActor::build,
        &LinearCritic::build,
        comm,
        StdRng::seed_from_u64(rank),
    )?;

    // Every worker sees different data.
    let mut rng = StdRng::seed_from_u64(100 + rank);
    for i in 0..10 {
        agent.store_transition(random_transition(&mut rng, i % 5 == 4), true)?;
    }
    agent.demonstrations_done()?;
    for i in 0..30 {
        agent.store_transition(random_transition(&mut rng, i % 7 == 6), false)?;
    }

    agent.initialize()?;
    for i in 0..12 {
        if i % 4 == 0 {
            agent.adapt_param_noise()?;
        }
        agent.train(i, i < 4)?;
        agent.update_target_net();
    }

    let stats = agent.get_stats()?;
    Ok(Outcome {
        actor: bits(agent.actor().params()),
        critic: bits(agent.critic().params()),
        target_critic: bits(agent.target_critic().params()),
        obs_rms_mean: stats.get_scalar("obs_rms_mean")?,
        param_noise_stddev: stats.get_scalar("param_noise_stddev")?,
    })
}

#[test]
fn test_synchronized_workers_keep_identical_parameters() {
    let handles = ChannelCommunicator::group(3)
        .into_iter()
        .map(|comm| thread::spawn(move || run_worker(comm)))
        .collect::<Vec<_>>();
    let outcomes = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect::<Vec<_>>();

    let root = &outcomes[0];
    for o in outcomes[1..].iter() {
        assert_eq!(root.actor, o.actor);
        assert_eq!(root.critic, o.critic);
        assert_eq!(root.target_critic, o.target_critic);
        assert_eq!(root.obs_rms_mean, o.obs_rms_mean);
        assert_eq!(root.param_noise_stddev, o.param_noise_stddev);
    }
}
