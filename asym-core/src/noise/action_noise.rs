use ndarray::Array1;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Noise added to actions.
pub trait ActionNoise: Send {
    /// Draws the next noise vector.
    fn sample(&mut self) -> Array1<f32>;

    /// Resets the state of the process at the beginning of an episode.
    fn reset(&mut self);

    /// Dimension of the noise vectors.
    fn dim(&self) -> usize;

    /// Short description used in logs.
    fn describe(&self) -> String;
}

fn standard_normal(rng: &mut StdRng, dim: usize) -> Array1<f32> {
    (0..dim)
        .map(|_| {
            let z: f32 = StandardNormal.sample(&mut *rng);
            z
        })
        .collect::<Array1<f32>>()
}

/// Independent Gaussian noise `N(mu, sigma^2)`.
pub struct NormalActionNoise {
    mu: Array1<f32>,
    sigma: Array1<f32>,
    rng: StdRng,
}

impl NormalActionNoise {
    pub fn new(mu: Array1<f32>, sigma: Array1<f32>, rng: StdRng) -> Self {
        debug_assert_eq!(mu.len(), sigma.len());
        Self { mu, sigma, rng }
    }
}

impl ActionNoise for NormalActionNoise {
    fn sample(&mut self) -> Array1<f32> {
        let z = standard_normal(&mut self.rng, self.mu.len());
        &self.mu + &(&self.sigma * &z)
    }

    fn reset(&mut self) {}

    fn dim(&self) -> usize {
        self.mu.len()
    }

    fn describe(&self) -> String {
        format!("NormalActionNoise(mu={}, sigma={})", self.mu, self.sigma)
    }
}

/// Temporally correlated Ornstein-Uhlenbeck noise.
///
/// `x <- x + theta (mu - x) dt + sigma sqrt(dt) N(0, 1)`.
pub struct OrnsteinUhlenbeckActionNoise {
    mu: Array1<f32>,
    sigma: Array1<f32>,
    theta: f32,
    dt: f32,
    x0: Option<Array1<f32>>,
    x_prev: Array1<f32>,
    rng: StdRng,
}

impl OrnsteinUhlenbeckActionNoise {
    /// Creates the process with `theta = 0.15` and `dt = 0.01`.
    pub fn new(mu: Array1<f32>, sigma: Array1<f32>, rng: StdRng) -> Self {
        Self::with_params(mu, sigma, 0.15, 1e-2, None, rng)
    }

    pub fn with_params(
        mu: Array1<f32>,
        sigma: Array1<f32>,
        theta: f32,
        dt: f32,
        x0: Option<Array1<f32>>,
        rng: StdRng,
    ) -> Self {
        let x_prev = x0.clone().unwrap_or_else(|| Array1::zeros(mu.len()));
        Self {
            mu,
            sigma,
            theta,
            dt,
            x0,
            x_prev,
            rng,
        }
    }

    /// Current value of the process.
    pub fn state(&self) -> &Array1<f32> {
        &self.x_prev
    }
}

impl ActionNoise for OrnsteinUhlenbeckActionNoise {
    fn sample(&mut self) -> Array1<f32> {
        let z = standard_normal(&mut self.rng, self.mu.len());
        let drift = (&self.mu - &self.x_prev) * (self.theta * self.dt);
        let diffusion = &self.sigma * &z * self.dt.sqrt();
        self.x_prev = &self.x_prev + &drift + &diffusion;
        self.x_prev.clone()
    }

    fn reset(&mut self) {
        self.x_prev = match &self.x0 {
            Some(x0) => x0.clone(),
            None => Array1::zeros(self.mu.len()),
        };
    }

    fn dim(&self) -> usize {
        self.mu.len()
    }

    fn describe(&self) -> String {
        format!(
            "OrnsteinUhlenbeckActionNoise(mu={}, sigma={})",
            self.mu, self.sigma
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_normal_noise_moments() {
        let mut noise = NormalActionNoise::new(
            Array1::from_elem(2, 0.5),
            Array1::from_elem(2, 0.2),
            StdRng::seed_from_u64(1),
        );
        let n = 20_000;
        let xs: Vec<f32> = (0..n).map(|_| noise.sample()[1]).collect();
        let mean = xs.iter().sum::<f32>() / n as f32;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n as f32;
        assert!((mean - 0.5).abs() < 0.01);
        assert!((var.sqrt() - 0.2).abs() < 0.01);
    }

    #[test]
    fn test_ou_noise_reset_and_correlation() {
        let mut noise = OrnsteinUhlenbeckActionNoise::new(
            Array1::zeros(1),
            Array1::from_elem(1, 0.2),
            StdRng::seed_from_u64(1),
        );
        let a = noise.sample()[0];
        let b = noise.sample()[0];
        // One step moves the process by at most a few sigma * sqrt(dt).
        assert!((b - a).abs() < 0.2);
        assert_eq!(noise.state()[0], b);

        noise.reset();
        assert_eq!(noise.state()[0], 0.0);

        let mut noise = OrnsteinUhlenbeckActionNoise::with_params(
            Array1::zeros(1),
            Array1::zeros(1),
            0.15,
            1e-2,
            Some(Array1::from_elem(1, 1.0)),
            StdRng::seed_from_u64(1),
        );
        // Without diffusion the process decays towards mu.
        let x = noise.sample()[0];
        assert!((x - (1.0 - 0.15 * 1e-2)).abs() < 1e-6);
        noise.reset();
        assert_eq!(noise.state()[0], 1.0);
    }
}
