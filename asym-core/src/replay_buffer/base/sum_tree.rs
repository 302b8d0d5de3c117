//! Sum tree for prioritized sampling.
//!
//! Leaves hold `priority^alpha`; every internal node holds the sum of its children, so
//! prefix sums and proportional retrieval take `O(log n)`. Raw priorities are also kept
//! in min/max segment trees.
use rand::{rngs::StdRng, Rng};
use segment_tree::{
    ops::{MaxIgnoreNaN, MinIgnoreNaN},
    SegmentPoint,
};

#[derive(Debug)]
pub struct SumTree {
    alpha: f32,
    capacity: usize,
    n_leaves: usize,
    tree: Vec<f32>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
}

impl SumTree {
    /// Creates a tree with `capacity` slots.
    ///
    /// The number of leaves is rounded up to a power of two so that leaf order
    /// matches index order.
    pub fn new(capacity: usize, alpha: f32) -> Self {
        let n_leaves = capacity.max(1).next_power_of_two();
        Self {
            alpha,
            capacity,
            n_leaves,
            tree: vec![0f32; 2 * n_leaves - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity.max(1)], MinIgnoreNaN),
            max_tree: SegmentPoint::build(vec![0f32; capacity.max(1)], MaxIgnoreNaN),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of `priority^alpha` over all slots.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Sets the priority of slot `ix`.
    pub fn update(&mut self, ix: usize, priority: f32) {
        debug_assert!(ix < self.capacity);
        debug_assert!(priority > 0.0);

        self.min_tree.modify(ix, priority);
        self.max_tree.modify(ix, priority);

        let mut node = ix + self.n_leaves - 1;
        self.tree[node] = priority.powf(self.alpha);
        while node != 0 {
            node = (node - 1) / 2;
            self.tree[node] = self.tree[2 * node + 1] + self.tree[2 * node + 2];
        }
    }

    /// `priority^alpha` of slot `ix`.
    pub fn leaf(&self, ix: usize) -> f32 {
        self.tree[ix + self.n_leaves - 1]
    }

    /// Raw priority of slot `ix`.
    pub fn priority(&self, ix: usize) -> f32 {
        self.max_tree.query(ix, ix + 1)
    }

    /// Largest raw priority among slots `[0, n)`.
    pub fn max(&self, n: usize) -> Option<f32> {
        (n > 0).then(|| self.max_tree.query(0, n))
    }

    /// Smallest raw priority among slots `[0, n)`.
    pub fn min(&self, n: usize) -> Option<f32> {
        (n > 0).then(|| self.min_tree.query(0, n))
    }

    /// Sum of `priority^alpha` over slots `[0, n)`.
    pub fn prefix_sum(&self, n: usize) -> f32 {
        if n >= self.n_leaves {
            return self.total();
        }
        let mut sum = 0f32;
        let mut node = 0;
        let mut lo = 0;
        let mut width = self.n_leaves;
        // Descend towards the boundary, adding left subtrees fully inside the range.
        while width > 1 {
            width /= 2;
            let left = 2 * node + 1;
            if n >= lo + width {
                sum += self.tree[left];
                lo += width;
                node = left + 1;
            } else {
                node = left;
            }
        }
        sum
    }

    /// Slot whose cumulative mass interval contains `s`.
    fn retrieve(&self, mut s: f32) -> usize {
        let mut node = 0;
        while node < self.n_leaves - 1 {
            let left = 2 * node + 1;
            if s < self.tree[left] || self.tree[left + 1] == 0f32 {
                node = left;
            } else {
                s -= self.tree[left];
                node = left + 1;
            }
        }
        node + 1 - self.n_leaves
    }

    /// Draws `batch_size` slots among `[0, n)` with probability proportional to
    /// `priority^alpha`.
    pub fn sample(&self, n: usize, batch_size: usize, rng: &mut StdRng) -> Vec<usize> {
        debug_assert!(n > 0);
        let mass = self.prefix_sum(n);
        (0..batch_size)
            .map(|_| {
                let s = mass * rng.gen::<f32>();
                // Rounding can push `s` past the last populated slot.
                self.retrieve(s).min(n - 1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_sum_tree_odd() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = SumTree::new(7, 1.0);
        for (ix, p) in data.iter().enumerate() {
            sum_tree.update(ix, *p);
        }

        let total = data.iter().sum::<f32>();
        assert!((sum_tree.total() - total).abs() < 1e-5);
        assert!((sum_tree.prefix_sum(3) - 1.5).abs() < 1e-6);
        assert_eq!(sum_tree.prefix_sum(0), 0.0);
        assert_eq!(sum_tree.max(7), Some(3.9));
        assert_eq!(sum_tree.min(7), Some(0.2));
        assert_eq!(sum_tree.max(4), Some(0.8));
        assert_eq!(sum_tree.priority(4), 1.1);

        assert_eq!(sum_tree.retrieve(0.0), 0);
        assert_eq!(sum_tree.retrieve(0.6), 1);
        assert_eq!(sum_tree.retrieve(1.49), 2);
        assert_eq!(sum_tree.retrieve(total - 0.01), 6);
    }

    #[test]
    fn test_alpha_is_applied_to_leaves() {
        let mut sum_tree = SumTree::new(4, 0.5);
        sum_tree.update(0, 4.0);
        sum_tree.update(1, 9.0);
        assert!((sum_tree.leaf(0) - 2.0).abs() < 1e-6);
        assert!((sum_tree.leaf(1) - 3.0).abs() < 1e-6);
        assert!((sum_tree.total() - 5.0).abs() < 1e-6);
        assert_eq!(sum_tree.priority(1), 9.0);
    }

    #[test]
    fn test_sample_within_prefix() {
        let mut sum_tree = SumTree::new(8, 1.0);
        for ix in 0..8 {
            sum_tree.update(ix, 1.0 + ix as f32);
        }
        let mut rng = StdRng::seed_from_u64(42);
        let ixs = sum_tree.sample(3, 1000, &mut rng);
        assert!(ixs.iter().all(|&ix| ix < 3));
    }
}
