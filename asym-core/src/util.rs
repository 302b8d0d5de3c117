//! Utilities.
use log::trace;

/// Soft update of target parameters, `dest <- tau * src + (1 - tau) * dest`.
///
/// `tau = 0` leaves `dest` untouched and `tau = 1` copies `src`, both bit for bit.
pub fn track(dest: &mut [f32], src: &[f32], tau: f32) {
    debug_assert_eq!(dest.len(), src.len());
    if tau == 0.0 {
        return;
    }
    if tau == 1.0 {
        dest.copy_from_slice(src);
        return;
    }
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d = tau * s + (1.0 - tau) * *d;
    }
    trace!("soft update");
}

/// Mean and population standard deviation, `(0, 0)` for an empty slice.
pub fn mean_std(xs: &[f32]) -> (f32, f32) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
    (mean, var.sqrt())
}
