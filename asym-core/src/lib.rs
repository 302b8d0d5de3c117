//! Building blocks for training asymmetric actor-critic agents.
//!
//! * [`replay_buffer`] - prioritized replay memory with n-step lookahead and a
//!   protected demonstration region.
//! * [`noise`] - action noise and adaptive parameter noise.
//! * [`running_stats`] - running mean/std normalizers.
//! * [`comm`] - collectives over data-parallel workers.
//! * [`opt`] - optimizers over flat parameter vectors.
//! * [`record`] - records and the sinks they are written to.
pub mod comm;
pub mod error;
pub mod noise;
pub mod opt;
pub mod record;
pub mod replay_buffer;
pub mod running_stats;
pub mod util;

mod base;
pub use base::{BoxSpace, DemoPolicy, Env, EnvSpaces, Step};
pub use error::AsymError;
