//! Returns, categorical distributions and diagnostics.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{distributions::Open01, Rng};

/// Discounted returns that restart after every finished episode.
///
/// `dones[t]` tells whether the episode ended with the transition at `t`.
pub fn discount_with_dones(rewards: &[f32], dones: &[bool], gamma: f32) -> Vec<f32> {
    let mut r = 0f32;
    let mut discounted = rewards
        .iter()
        .rev()
        .zip(dones.iter().rev())
        .map(|(&reward, &done)| {
            r = reward + gamma * r * (1.0 - done as i32 as f32);
            r
        })
        .collect::<Vec<_>>();
    discounted.reverse();
    discounted
}

/// `1 - Var[y - ypred] / Var[y]`, or NaN when `y` is constant.
///
/// 1 is a perfect prediction, 0 is no better than predicting the mean and negative
/// values are worse than that.
pub fn explained_variance(ypred: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
    let var_y = y.var(0.0);
    if var_y == 0.0 {
        return f32::NAN;
    }
    1.0 - (&y - &ypred).var(0.0) / var_y
}

/// Row-wise log-softmax.
pub fn log_softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let lse = row.mapv(|v| (v - max).exp()).sum().ln() + max;
        row.mapv_inplace(|v| v - lse);
    }
    out
}

/// Row-wise entropy of the categorical distributions given by `logp`.
pub fn entropy(logp: ArrayView2<f32>) -> Array1<f32> {
    -(&logp.mapv(f32::exp) * &logp).sum_axis(Axis(1))
}

/// Samples one action per row with the Gumbel-max trick,
/// `argmax(logits - log(-log(u)))`.
pub fn sample_categorical<R: Rng + ?Sized>(logits: ArrayView2<f32>, rng: &mut R) -> Vec<usize> {
    logits
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = (0, f32::NEG_INFINITY);
            for (j, &l) in row.iter().enumerate() {
                let u: f32 = rng.sample(Open01);
                let v = l - (-u.ln()).ln();
                if v > best.1 {
                    best = (j, v);
                }
            }
            best.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_discount_with_dones() {
        let r = discount_with_dones(&[1.0, 1.0, 1.0], &[false, false, false], 0.5);
        assert_eq!(r, vec![1.75, 1.5, 1.0]);

        // Nothing flows back over the end of an episode.
        let r = discount_with_dones(&[1.0, 1.0, 1.0], &[false, true, false], 0.5);
        assert_eq!(r, vec![1.5, 1.0, 1.0]);
    }

    #[test]
    fn test_explained_variance() {
        let y = arr1(&[1.0, 2.0, 3.0]);
        assert!((explained_variance(y.view(), y.view()) - 1.0).abs() < 1e-6);
        let mean = arr1(&[2.0, 2.0, 2.0]);
        assert!(explained_variance(mean.view(), y.view()).abs() < 1e-6);
        assert!(explained_variance(y.view(), mean.view()).is_nan());
    }

    #[test]
    fn test_log_softmax_and_entropy() {
        let logp = log_softmax(arr2(&[[0.0, 0.0], [1000.0, 0.0]]).view());
        assert!((logp[[0, 0]] - 0.5f32.ln()).abs() < 1e-6);
        assert_eq!(logp[[1, 0]], 0.0);
        assert!(logp.iter().all(|v| v.is_finite()));

        let h = entropy(logp.view());
        assert!((h[0] - 2f32.ln()).abs() < 1e-6);
        assert!(h[1].abs() < 1e-6);
    }

    #[test]
    fn test_sample_categorical() {
        let mut rng = StdRng::seed_from_u64(0);
        let logits = arr2(&[[0.0, 2f32.ln(), f32::NEG_INFINITY]]);
        let n = 30000;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            counts[sample_categorical(logits.view(), &mut rng)[0]] += 1;
        }
        assert_eq!(counts[2], 0);
        let p1 = counts[1] as f32 / n as f32;
        assert!((p1 - 2.0 / 3.0).abs() < 0.02, "{}", p1);
    }
}
