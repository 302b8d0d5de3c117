//! Prioritized replay memory with n-step lookahead and demonstrations.
mod base;
mod batch;
mod config;
mod transition;
pub use base::{IwScheduler, PrioritizedReplayBuffer};
pub use batch::TransitionBatch;
pub use config::{ReplayBufferConfig, TransitionDims};
pub use transition::Transition;
