use super::{ActionNoise, NormalActionNoise, OrnsteinUhlenbeckActionNoise};
use crate::error::AsymError;
use anyhow::Result;
use log::info;
use ndarray::Array1;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Action noise, tagged by `type` in YAML.
///
/// ```yaml
/// type: ornstein_uhlenbeck
/// stddev: 0.2
/// theta: 0.15
/// dt: 0.01
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionNoiseConfig {
    /// Independent Gaussian noise.
    Normal {
        /// Standard deviation for every action dimension.
        stddev: f32,
    },

    /// Ornstein-Uhlenbeck process around zero.
    OrnsteinUhlenbeck {
        /// Diffusion scale for every action dimension.
        stddev: f32,
        /// Mean reversion rate.
        #[serde(default = "default_theta")]
        theta: f32,
        /// Time step.
        #[serde(default = "default_dt")]
        dt: f32,
    },
}

fn default_theta() -> f32 {
    0.15
}

fn default_dt() -> f32 {
    1e-2
}

impl ActionNoiseConfig {
    /// Builds the noise process for actions of size `dim`.
    pub fn build(&self, dim: usize, rng: StdRng) -> Box<dyn ActionNoise> {
        let mu = Array1::zeros(dim);
        match *self {
            Self::Normal { stddev } => {
                Box::new(NormalActionNoise::new(mu, Array1::from_elem(dim, stddev), rng))
            }
            Self::OrnsteinUhlenbeck { stddev, theta, dt } => {
                Box::new(OrnsteinUhlenbeckActionNoise::with_params(
                    mu,
                    Array1::from_elem(dim, stddev),
                    theta,
                    dt,
                    None,
                    rng,
                ))
            }
        }
    }
}

/// Parameters of [`AdaptiveParamNoise`](super::AdaptiveParamNoise).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ParamNoiseConfig {
    pub initial_stddev: f32,
    pub desired_action_stddev: f32,
    pub adoption_coefficient: f32,
}

impl Default for ParamNoiseConfig {
    fn default() -> Self {
        Self {
            initial_stddev: 0.1,
            desired_action_stddev: 0.1,
            adoption_coefficient: 1.01,
        }
    }
}

/// Exploration noise of an agent. Both kinds can be combined.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct NoiseConfig {
    /// Noise added to actions.
    pub action: Option<ActionNoiseConfig>,

    /// Noise applied to the parameters of the actor.
    pub param: Option<ParamNoiseConfig>,
}

impl NoiseConfig {
    /// Sets the action noise.
    pub fn action(mut self, action: Option<ActionNoiseConfig>) -> Self {
        self.action = action;
        self
    }

    /// Sets the parameter noise.
    pub fn param(mut self, param: Option<ParamNoiseConfig>) -> Self {
        self.param = param;
        self
    }
}

impl FromStr for NoiseConfig {
    type Err = AsymError;

    /// Parses a comma-separated list such as `adaptive-param_0.2,ou_0.2`.
    ///
    /// Accepted kinds are `none`, `adaptive-param_<stddev>`, `normal_<stddev>` and
    /// `ou_<stddev>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = NoiseConfig::default();
        for current in s.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if current == "none" {
                continue;
            }
            let (kind, stddev) = current
                .split_once('_')
                .ok_or_else(|| AsymError::UnknownNoise(current.to_string()))?;
            let stddev: f32 = stddev
                .parse()
                .map_err(|_| AsymError::UnknownNoise(current.to_string()))?;
            match kind {
                "adaptive-param" => {
                    config.param = Some(ParamNoiseConfig {
                        initial_stddev: stddev,
                        desired_action_stddev: stddev,
                        ..ParamNoiseConfig::default()
                    })
                }
                "normal" => config.action = Some(ActionNoiseConfig::Normal { stddev }),
                "ou" => {
                    config.action = Some(ActionNoiseConfig::OrnsteinUhlenbeck {
                        stddev,
                        theta: default_theta(),
                        dt: default_dt(),
                    })
                }
                _ => return Err(AsymError::UnknownNoise(current.to_string())),
            }
        }
        info!("Noise configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_noise_list() {
        let config: NoiseConfig = "adaptive-param_0.2, ou_0.3".parse().unwrap();
        assert_eq!(
            config.param,
            Some(ParamNoiseConfig {
                initial_stddev: 0.2,
                desired_action_stddev: 0.2,
                adoption_coefficient: 1.01
            })
        );
        assert_eq!(
            config.action,
            Some(ActionNoiseConfig::OrnsteinUhlenbeck {
                stddev: 0.3,
                theta: 0.15,
                dt: 1e-2
            })
        );

        let config: NoiseConfig = "none".parse().unwrap();
        assert_eq!(config, NoiseConfig::default());

        assert_eq!(
            "gumbel_0.1".parse::<NoiseConfig>(),
            Err(AsymError::UnknownNoise("gumbel_0.1".into()))
        );
        assert!("normal_x".parse::<NoiseConfig>().is_err());
    }

    #[test]
    fn test_tagged_yaml() {
        let yaml = "action:\n  type: normal\n  stddev: 0.1\nparam: ~\n";
        let config: NoiseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.action, Some(ActionNoiseConfig::Normal { stddev: 0.1 }));

        let s = serde_yaml::to_string(&config).unwrap();
        let config_: NoiseConfig = serde_yaml::from_str(&s).unwrap();
        assert_eq!(config, config_);
    }
}
