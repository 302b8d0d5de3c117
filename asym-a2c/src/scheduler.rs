//! Learning rate schedules.
use serde::{Deserialize, Serialize};

/// Shape of a schedule over the fraction `p` of elapsed steps.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Schedule {
    /// `1`.
    Constant,

    /// `1 - p`.
    Linear,
}

impl Schedule {
    fn factor(&self, p: f64) -> f64 {
        match self {
            Self::Constant => 1.0,
            Self::Linear => 1.0 - p,
        }
    }
}

/// A value decayed over `nvalues` calls of [`Scheduler::value`].
///
/// ```rust
/// use asym_a2c::{Schedule, Scheduler};
///
/// let mut lr = Scheduler::new(1.0, 4, Schedule::Linear);
/// assert_eq!(lr.value(), 1.0);
/// assert_eq!(lr.value(), 0.75);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Scheduler {
    v: f32,
    nvalues: usize,
    schedule: Schedule,
    n: usize,
}

impl Scheduler {
    pub fn new(v: f32, nvalues: usize, schedule: Schedule) -> Self {
        Self {
            v,
            nvalues,
            schedule,
            n: 0,
        }
    }

    /// Returns the current value and advances by one step.
    pub fn value(&mut self) -> f32 {
        let p = self.n as f64 / self.nvalues.max(1) as f64;
        self.n += 1;
        (self.v as f64 * self.schedule.factor(p)) as f32
    }

    /// Number of calls to [`Scheduler::value`] so far.
    pub fn steps(&self) -> usize {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let mut s = Scheduler::new(7e-4, 10, Schedule::Constant);
        for _ in 0..20 {
            assert_eq!(s.value(), 7e-4);
        }
        assert_eq!(s.steps(), 20);
    }

    #[test]
    fn test_linear() {
        let mut s = Scheduler::new(2.0, 4, Schedule::Linear);
        let values = (0..5).map(|_| s.value()).collect::<Vec<_>>();
        assert_eq!(values, vec![2.0, 1.5, 1.0, 0.5, 0.0]);
    }
}
