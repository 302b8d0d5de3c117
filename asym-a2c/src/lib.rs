//! Synchronous advantage actor-critic (A2C).
//!
//! A [`Runner`] steps all environments of a [`VecEnv`] for `nsteps` steps, sampling
//! categorical actions from an [`ActorCriticModel`], and turns the rewards into
//! bootstrapped discounted returns. [`A2cModel::train`] then takes one RMSProp step
//! on `pg_loss - ent_coef * entropy + vf_coef * vf_loss`. [`learn`] repeats both
//! until `total_timesteps` environment steps have been made.
mod base;
mod config;
mod env;
mod learn;
mod model;
mod runner;
mod scheduler;
pub mod util;

pub use base::{A2cLoss, A2cModel};
pub use config::A2cConfig;
pub use env::{VecEnv, VecStep};
pub use learn::{eval_policy, learn, snapshot_file};
pub use model::ActorCriticModel;
pub use runner::{Rollout, Runner};
pub use scheduler::{Schedule, Scheduler};
