use super::ParamNoiseConfig;
use crate::record::Record;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Parameter-space noise with an adaptive scale.
///
/// After measuring the distance between the actions of the clean and the perturbed
/// actor, the scale shrinks when the distance exceeds `desired_action_stddev` and
/// grows otherwise.
pub struct AdaptiveParamNoise {
    initial_stddev: f32,
    desired_action_stddev: f32,
    adoption_coefficient: f32,
    current_stddev: f32,
    rng: StdRng,
}

impl AdaptiveParamNoise {
    pub fn new(config: &ParamNoiseConfig, rng: StdRng) -> Self {
        Self {
            initial_stddev: config.initial_stddev,
            desired_action_stddev: config.desired_action_stddev,
            adoption_coefficient: config.adoption_coefficient,
            current_stddev: config.initial_stddev,
            rng,
        }
    }

    pub fn current_stddev(&self) -> f32 {
        self.current_stddev
    }

    /// Overwrites the scale, e.g. when restoring a checkpoint.
    pub fn set_current_stddev(&mut self, stddev: f32) {
        self.current_stddev = stddev;
    }

    pub fn desired_action_stddev(&self) -> f32 {
        self.desired_action_stddev
    }

    /// Adapts the scale to the measured action distance.
    pub fn adapt(&mut self, distance: f32) {
        if distance > self.desired_action_stddev {
            self.current_stddev /= self.adoption_coefficient;
        } else {
            self.current_stddev *= self.adoption_coefficient;
        }
    }

    /// Writes `src + N(0, current_stddev^2)` into `dest`.
    ///
    /// Entries whose `perturbable` flag is off are copied unchanged.
    pub fn perturb(&mut self, src: &[f32], perturbable: &[bool], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len(), perturbable.len());
        for ((d, s), p) in dest.iter_mut().zip(src.iter()).zip(perturbable.iter()) {
            *d = if *p {
                let z: f32 = StandardNormal.sample(&mut self.rng);
                s + self.current_stddev * z
            } else {
                *s
            };
        }
    }

    /// Restores the initial scale.
    pub fn reset(&mut self) {
        self.current_stddev = self.initial_stddev;
    }

    pub fn get_stats(&self) -> Record {
        Record::from_scalar("param_noise_stddev", self.current_stddev)
    }

    pub fn describe(&self) -> String {
        format!(
            "AdaptiveParamNoise(initial_stddev={}, desired_action_stddev={}, adoption_coefficient={})",
            self.initial_stddev, self.desired_action_stddev, self.adoption_coefficient
        )
    }
}
