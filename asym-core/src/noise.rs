//! Exploration noise.
//!
//! Action noise ([`NormalActionNoise`], [`OrnsteinUhlenbeckActionNoise`]) is added to
//! the output of the actor. Parameter noise ([`AdaptiveParamNoise`]) perturbs the
//! weights of a copy of the actor and adapts its scale so that the induced change
//! of actions stays close to a target.
mod action_noise;
mod config;
mod param_noise;
pub use action_noise::{ActionNoise, NormalActionNoise, OrnsteinUhlenbeckActionNoise};
pub use config::{ActionNoiseConfig, NoiseConfig, ParamNoiseConfig};
pub use param_noise::AdaptiveParamNoise;
