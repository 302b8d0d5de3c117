//! DDPG agent.
mod base;
mod checkpoint;
mod config;
pub use base::{Ddpg, Phase};
pub use checkpoint::{DdpgCheckpoint, AGENT_FILE};
pub use config::{AdamConfig, DdpgConfig};
