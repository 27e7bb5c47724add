// CART-style regression tree used as the forest's base learner

use pb_data::Dataset;
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    /// Nodes with fewer rows than this become leaves.
    pub min_samples_split: usize,
    /// Number of features considered at each split.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// Binary regression tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit on the rows of `data` named by `indices` (duplicates allowed, as
    /// produced by bootstrap sampling). `indices` must be non-empty.
    pub fn fit<R: Rng + ?Sized>(
        data: &Dataset,
        indices: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut rows = indices.to_vec();
        tree.grow(data, &mut rows, 0, params, rng);
        tree
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, id: usize) -> usize {
        match &self.nodes[id] {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => {
                1 + self.depth_from(*left).max(self.depth_from(*right))
            }
        }
    }

    fn grow<R: Rng + ?Sized>(
        &mut self,
        data: &Dataset,
        rows: &mut [usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        let value = rows.iter().map(|&i| data.targets[i]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value });

        if depth >= params.max_depth || rows.len() < params.min_samples_split.max(2) {
            return id;
        }

        let Some(split) = Self::best_split(data, rows, params, rng) else {
            return id;
        };

        // In-place partition: rows going left end up in rows[..mid].
        let mut mid = 0;
        for i in 0..rows.len() {
            if data.row(rows[i])[split.feature] <= split.threshold {
                rows.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == rows.len() {
            return id;
        }

        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.grow(data, left_rows, depth + 1, params, rng);
        let right = self.grow(data, right_rows, depth + 1, params, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    /// Lowest summed squared error split over a random feature subset, if it
    /// improves on not splitting.
    fn best_split<R: Rng + ?Sized>(
        data: &Dataset,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Option<Split> {
        let n_features = data.n_features();
        let k = params.max_features.clamp(1, n_features);
        let candidates = sample(rng, n_features, k).into_vec();

        let n = rows.len() as f64;
        let total_sum: f64 = rows.iter().map(|&i| data.targets[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| data.targets[i] * data.targets[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n;

        let mut best: Option<Split> = None;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(rows.len());

        for feature in candidates {
            column.clear();
            column.extend(rows.iter().map(|&i| (data.row(i)[feature], data.targets[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..column.len() - 1 {
                let (x, y) = column[pos];
                left_sum += y;
                left_sq += y * y;

                let next_x = column[pos + 1].0;
                if x == next_x {
                    continue;
                }

                let n_left = (pos + 1) as f64;
                let n_right = n - n_left;
                let right_sum = total_sum - left_sum;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + ((total_sq - left_sq) - right_sum * right_sum / n_right);

                if best.map_or(true, |b| sse < b.sse) {
                    best = Some(Split {
                        feature,
                        threshold: x + (next_x - x) / 2.0,
                        sse,
                    });
                }
            }
        }

        best.filter(|b| b.sse < parent_sse - 1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn step_data() -> Dataset {
        let features = (0..10).map(|i| vec![i as f64]).collect();
        let targets = (0..10).map(|i| if i < 5 { 1.0 } else { 3.0 }).collect();
        Dataset::new(vec!["x".into()], "y".into(), features, targets).unwrap()
    }

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            max_features: 1,
        }
    }

    #[test]
    fn single_split_fits_step_function() {
        let data = step_data();
        let rows: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = RegressionTree::fit(&data, &rows, &params(1), &mut rng);

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict(&[2.0]), 1.0);
        assert_eq!(tree.predict(&[7.0]), 3.0);
        assert_eq!(tree.predict(&[4.5]), 1.0);
    }

    #[test]
    fn depth_zero_predicts_mean() {
        let data = step_data();
        let rows: Vec<usize> = (0..10).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = RegressionTree::fit(&data, &rows, &params(0), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[100.0]), 2.0);
    }

    #[test]
    fn constant_target_does_not_split() {
        let features = (0..6).map(|i| vec![i as f64]).collect();
        let data =
            Dataset::new(vec!["x".into()], "y".into(), features, vec![5.0; 6]).unwrap();
        let rows: Vec<usize> = (0..6).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = RegressionTree::fit(&data, &rows, &params(4), &mut rng);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn respects_max_depth() {
        let features = (0..64).map(|i| vec![i as f64]).collect();
        let targets = (0..64).map(|i| (i * i) as f64).collect();
        let data = Dataset::new(vec!["x".into()], "y".into(), features, targets).unwrap();
        let rows: Vec<usize> = (0..64).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let tree = RegressionTree::fit(&data, &rows, &params(3), &mut rng);
        assert!(tree.depth() <= 3);
        assert!(tree.node_count() > 1);
    }

    #[test]
    fn duplicate_rows_from_bootstrap() {
        let data = step_data();
        let rows = vec![0, 0, 0, 9, 9];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tree = RegressionTree::fit(&data, &rows, &params(2), &mut rng);
        assert_eq!(tree.predict(&[0.0]), 1.0);
        assert_eq!(tree.predict(&[9.0]), 3.0);
    }
}
