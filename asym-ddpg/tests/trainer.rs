mod common;
use anyhow::Result;
use asym_core::{comm::LocalCommunicator, record::BufferedRecorder, AsymError, DemoPolicy};
use asym_ddpg::{
    ddpg::AGENT_FILE,
    trainer::{ENV_STATE_FILE, EVAL_ENV_STATE_FILE},
    Ddpg, Phase, Trainer, TrainerConfig,
};
use common::{ddpg_config, GreedyPolicy, LinearActor, LinearCritic, PointEnv};
use rand::{rngs::StdRng, SeedableRng};
use tempdir::TempDir;
use test_log::test;

type Agent = Ddpg<LinearActor, LinearCritic, LocalCommunicator>;

fn agent() -> Result<Agent> {
    Ddpg::build(
        ddpg_config().batch_size(16),
        &LinearActor::build,
        &LinearCritic::build,
        LocalCommunicator,
        StdRng::seed_from_u64(42),
    )
}

fn trainer_config() -> TrainerConfig {
    TrainerConfig::default()
        .nb_epochs(2)
        .nb_epoch_cycles(2)
        .nb_rollout_steps(20)
        .nb_train_steps(5)
        .nb_eval_steps(15)
        .param_noise_adaption_interval(2)
        .num_demo_steps(40)
        .num_pretrain_steps(10)
        .run_name("point")
}

#[test]
fn test_train_with_demonstrations() -> Result<()> {
    let dir = TempDir::new("ddpg_trainer")?;
    let model_dir = dir.path().to_str().unwrap().to_string();
    let trainer = Trainer::build(trainer_config().model_dir(&model_dir));

    let mut agent = agent()?;
    let mut env = PointEnv::new(0);
    let mut eval_env = PointEnv::new(1);
    let mut demo_env = PointEnv::new(2);
    let mut policy = GreedyPolicy::new();
    let mut recorder = BufferedRecorder::new();

    let record = trainer.train(
        &mut agent,
        &mut env,
        Some(&mut eval_env),
        Some((&mut demo_env, &mut policy as &mut dyn DemoPolicy)),
        &mut recorder,
    )?;

    assert_eq!(agent.num_demonstrations(), 40);
    assert!(policy.n_resets >= 4);
    assert_eq!(agent.memory_len(), 40 + 2 * 2 * 20);
    assert_eq!(agent.n_opts(), 10 + 2 * 2 * 5);
    assert_eq!(agent.phase(), Phase::Checkpointed);

    assert_eq!(record.get_scalar("total/epochs")?, 2.0);
    assert_eq!(record.get_scalar("total/steps")?, 80.0);
    assert!(record.get_scalar("eval/episodes")? >= 1.0);
    assert!(record.get_scalar("rollout/return")? <= 0.0);
    assert!(record.get_scalar("reference_Q_mean").is_ok());

    // Hyperparameters, episode returns, per-step losses and epoch statistics.
    assert_eq!(recorder.with_key("run_name").count(), 1);
    assert!(recorder.with_key("returns").count() >= 8);
    assert!(recorder.with_key("returns_eval").count() >= 2);
    assert_eq!(recorder.with_key("critic_loss").count(), 30);
    assert_eq!(recorder.with_key("total/epochs").count(), 2);

    for file in [AGENT_FILE, ENV_STATE_FILE, EVAL_ENV_STATE_FILE] {
        assert!(dir.path().join(file).exists(), "{}", file);
    }
    Ok(())
}

#[test]
fn test_pretraining_is_skipped_without_enough_demonstrations() -> Result<()> {
    let trainer = Trainer::build(trainer_config().nb_epochs(0).num_demo_steps(5));
    let mut agent = agent()?;
    let mut env = PointEnv::new(0);
    let mut demo_env = PointEnv::new(2);
    let mut policy = GreedyPolicy::new();
    let mut recorder = BufferedRecorder::new();

    trainer.train(
        &mut agent,
        &mut env,
        None,
        Some((&mut demo_env, &mut policy as &mut dyn DemoPolicy)),
        &mut recorder,
    )?;
    assert_eq!(agent.num_demonstrations(), 5);
    assert_eq!(agent.n_opts(), 0);
    assert_eq!(agent.phase(), Phase::Initialized);
    Ok(())
}

#[test]
fn test_train_without_demonstrations() -> Result<()> {
    let trainer = Trainer::build(
        trainer_config()
            .nb_epochs(1)
            .nb_rollout_steps(10)
            .num_pretrain_steps(0),
    );
    let mut agent = agent()?;
    let mut env = PointEnv::new(0);
    let mut recorder = BufferedRecorder::new();

    let record = trainer.train(&mut agent, &mut env, None, None, &mut recorder)?;
    assert_eq!(agent.num_demonstrations(), 0);
    assert!(agent.memory().is_sealed());
    // The memory holds a batch only from the second cycle on.
    assert_eq!(agent.n_opts(), 5);
    assert!(record.get_scalar("eval/return").is_err());
    Ok(())
}

#[test]
fn test_asymmetric_action_space_is_rejected() -> Result<()> {
    let trainer = Trainer::build(trainer_config());
    let mut agent = agent()?;
    let mut env = PointEnv::asymmetric(0);
    let mut recorder = BufferedRecorder::new();
    let err = trainer
        .train(&mut agent, &mut env, None, None, &mut recorder)
        .unwrap_err();
    assert!(matches!(
        err.downcast::<AsymError>()?,
        AsymError::Precondition(_)
    ));
    assert_eq!(agent.phase(), Phase::Uninitialized);
    Ok(())
}

#[test]
fn test_action_dimension_mismatch_is_rejected() -> Result<()> {
    let trainer = Trainer::build(trainer_config());
    let mut agent = agent()?;
    let mut env = PointEnv::with_action_dim(0, 3);
    let mut recorder = BufferedRecorder::new();
    let err = trainer
        .train(&mut agent, &mut env, None, None, &mut recorder)
        .unwrap_err();
    assert_eq!(
        err.downcast::<AsymError>()?,
        AsymError::shape("action", 2, 3)
    );
    assert_eq!(agent.phase(), Phase::Uninitialized);
    Ok(())
}

#[test]
fn test_zero_adaption_interval_is_rejected() -> Result<()> {
    let trainer = Trainer::build(trainer_config().param_noise_adaption_interval(0));
    let mut agent = agent()?;
    let mut env = PointEnv::new(0);
    let mut recorder = BufferedRecorder::new();
    let err = trainer
        .train(&mut agent, &mut env, None, None, &mut recorder)
        .unwrap_err();
    assert!(matches!(
        err.downcast::<AsymError>()?,
        AsymError::Precondition(_)
    ));
    assert_eq!(agent.n_opts(), 0);
    Ok(())
}

#[test]
fn test_evaluation_only() -> Result<()> {
    let dir = TempDir::new("ddpg_eval_only")?;
    let mut saved = agent()?;
    saved.initialize()?;
    saved.save_params(dir.path())?;

    let trainer = Trainer::build(
        trainer_config()
            .load_from_file(dir.path().to_str().unwrap())
            .n_eval_only_episodes(3),
    );
    let mut agent = agent()?;
    let mut env = PointEnv::new(0);
    let mut recorder = BufferedRecorder::new();
    let record = trainer.train(&mut agent, &mut env, None, None, &mut recorder)?;

    assert_eq!(record.get_scalar("eval/episodes")?, 3.0);
    assert_eq!(recorder.with_key("returns_eval").count(), 3);
    assert_eq!(agent.memory_len(), 0);
    assert_eq!(agent.n_opts(), 0);
    Ok(())
}
