//! DDPG from demonstrations with an asymmetric critic.
//!
//! * [`Ddpg`] - the agent: actor, critic, their targets, exploration noise and a
//!   prioritized replay memory holding demonstrations and online transitions.
//! * [`Trainer`] - the training loop: demonstration collection, pretraining,
//!   rollouts, optimization, evaluation and checkpointing.
//! * [`model`] - capabilities the agent needs from its function approximators.
pub mod ddpg;
pub mod model;
pub mod trainer;
pub use ddpg::{Ddpg, DdpgConfig, Phase};
pub use trainer::{Trainer, TrainerConfig};
