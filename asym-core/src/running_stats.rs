//! Online estimation of feature means and standard deviations.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Running mean and variance of feature vectors.
///
/// Batches are merged with the parallel variance formula of Chan et al., which gives
/// the same result regardless of how the data is split into batches. Statistics
/// are accumulated in `f64`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RunningMeanStd {
    count: f64,
    mean: Array1<f64>,
    m2: Array1<f64>,
    min_var: f64,
}

impl RunningMeanStd {
    /// Creates an empty accumulator with the variance floored at `1e-2`.
    pub fn new(dim: usize) -> Self {
        Self::with_min_var(dim, 1e-2)
    }

    pub fn with_min_var(dim: usize, min_var: f64) -> Self {
        Self {
            count: 0.0,
            mean: Array1::zeros(dim),
            m2: Array1::zeros(dim),
            min_var,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    /// Merges a batch of rows.
    pub fn update(&mut self, batch: ArrayView2<f32>) {
        let n = batch.nrows();
        if n == 0 {
            return;
        }
        let batch = batch.mapv(|x| x as f64);
        let mean = batch.sum_axis(Axis(0)) / n as f64;
        let m2 = (&batch - &mean).mapv(|x| x * x).sum_axis(Axis(0));
        self.merge(n as f64, mean, m2);
    }

    /// Merges a single row.
    pub fn update_one(&mut self, x: ArrayView1<f32>) {
        self.update(x.insert_axis(Axis(0)));
    }

    /// Merges a batch given by its sums, e.g. after an all-reduce across workers.
    ///
    /// `sum` and `sumsq` are per-feature sums of `x` and `x^2` over `count` rows.
    pub fn update_from_sums(&mut self, count: f64, sum: ArrayView1<f64>, sumsq: ArrayView1<f64>) {
        if count <= 0.0 {
            return;
        }
        let mean = &sum / count;
        let m2 = (&sumsq - &(&mean * &sum)).mapv(|x| x.max(0.0));
        self.merge(count, mean, m2);
    }

    fn merge(&mut self, n: f64, batch_mean: Array1<f64>, batch_m2: Array1<f64>) {
        let total = self.count + n;
        let delta = &batch_mean - &self.mean;
        self.mean = &self.mean + &(&delta * (n / total));
        self.m2 = &self.m2 + &batch_m2 + &(delta.mapv(|d| d * d) * (self.count * n / total));
        self.count = total;
    }

    /// Population variance, zero when empty.
    pub fn var(&self) -> Array1<f64> {
        if self.count > 0.0 {
            &self.m2 / self.count
        } else {
            Array1::zeros(self.dim())
        }
    }

    pub fn mean(&self) -> Array1<f32> {
        self.mean.mapv(|x| x as f32)
    }

    /// `sqrt(max(var, min_var))`.
    pub fn std(&self) -> Array1<f32> {
        let min_var = self.min_var;
        self.var().mapv(|v| v.max(min_var).sqrt() as f32)
    }

    /// `clip((x - mean) / std, lo, hi)` applied row-wise.
    pub fn normalize(&self, x: ArrayView2<f32>, range: (f32, f32)) -> Array2<f32> {
        let mean = self.mean();
        let std = self.std();
        ((&x - &mean) / &std).mapv(|v| v.max(range.0).min(range.1))
    }

    /// Inverse of the normalization without clipping.
    pub fn denormalize(&self, x: ArrayView2<f32>) -> Array2<f32> {
        &x * &self.std() + &self.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, s};
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn data(n: usize) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(7);
        let d0 = Normal::new(3.0f32, 2.0).unwrap();
        let d1 = Normal::new(-1.0f32, 0.5).unwrap();
        let mut x = Array2::zeros((n, 2));
        for i in 0..n {
            x[[i, 0]] = d0.sample(&mut rng);
            x[[i, 1]] = d1.sample(&mut rng);
        }
        x
    }

    #[test]
    fn test_matches_batch_statistics() {
        let x = data(10_000);
        let mut rms = RunningMeanStd::new(2);
        for chunk in x.axis_chunks_iter(Axis(0), 37) {
            rms.update(chunk);
        }

        let x64 = x.mapv(|v| v as f64);
        let mean = x64.mean_axis(Axis(0)).unwrap();
        let var = x64.var_axis(Axis(0), 0.0);
        for j in 0..2 {
            assert!((rms.mean()[j] as f64 - mean[j]).abs() < 1e-4);
            assert!((rms.var()[j] - var[j]).abs() < 1e-3);
        }
        assert!((rms.mean()[0] - 3.0).abs() < 0.1);
        assert!((rms.std()[1] - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_chunking_invariance() {
        let x = data(100);
        let mut a = RunningMeanStd::new(2);
        a.update(x.view());

        let mut b = RunningMeanStd::new(2);
        b.update(x.slice(s![..30, ..]));
        b.update(x.slice(s![30..31, ..]));
        b.update(x.slice(s![31.., ..]));

        let mut c = RunningMeanStd::new(2);
        for row in x.rows() {
            c.update_one(row);
        }

        for other in [&b, &c] {
            assert_eq!(a.count(), other.count());
            for j in 0..2 {
                assert!((a.mean()[j] - other.mean()[j]).abs() < 1e-5);
                assert!((a.var()[j] - other.var()[j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_update_from_sums() {
        let x = data(50);
        let mut a = RunningMeanStd::new(2);
        a.update(x.view());

        let x64 = x.mapv(|v| v as f64);
        let sum = x64.sum_axis(Axis(0));
        let sumsq = x64.mapv(|v| v * v).sum_axis(Axis(0));
        let mut b = RunningMeanStd::new(2);
        b.update_from_sums(50.0, sum.view(), sumsq.view());

        for j in 0..2 {
            assert!((a.mean()[j] - b.mean()[j]).abs() < 1e-5);
            assert!((a.var()[j] - b.var()[j]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_std_floor_and_normalize() {
        let mut rms = RunningMeanStd::new(2);
        assert!(rms.std().iter().all(|s| (s - 0.1).abs() < 1e-7));

        rms.update(arr2(&[[1.0f32, 10.0], [1.0, 30.0]]).view());
        let std = rms.std();
        assert!((std[0] - 0.1).abs() < 1e-6);
        assert!((std[1] - 10.0).abs() < 1e-5);

        let y = rms.normalize(arr2(&[[1.0f32, 40.0], [0.0, -100.0]]).view(), (-4.0, 4.0));
        assert!(y[[0, 0]].abs() < 1e-6);
        assert!((y[[0, 1]] - 2.0).abs() < 1e-5);
        assert_eq!(y[[1, 0]], -4.0);
        assert_eq!(y[[1, 1]], -4.0);

        let z = rms.denormalize(rms.normalize(arr2(&[[1.5f32, 25.0]]).view(), (-10.0, 10.0)).view());
        assert!((z[[0, 0]] - 1.5).abs() < 1e-5);
        assert!((z[[0, 1]] - 25.0).abs() < 1e-4);
    }
}
