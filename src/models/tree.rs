//! CART regression trees stored as flat node tables.
//!
//! Node `i` is a leaf when `left[i] == right[i] == LEAF`; otherwise rows with
//! `x[feature[i]] <= threshold[i]` go to `left[i]` and the rest to `right[i]`.
//! Children are always created after their parent, so child ids are strictly
//! greater than the parent id and a walk from the root always terminates.

use std::cmp::Ordering;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Child id marking a leaf.
pub const LEAF: i64 = -1;

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub left: Vec<i64>,
    pub right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

struct Pending {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
}

impl Tree {
    /// Grow a tree on `rows` of `x` (duplicates allowed, as in a bootstrap).
    pub fn fit(x: &DMatrix<f64>, y: &[f64], rows: &[usize], params: &TreeParams) -> Self {
        let mut tree = Tree::default();
        let root = tree.push_leaf(mean_at(y, rows));
        let mut stack = vec![Pending {
            node: root,
            rows: rows.to_vec(),
            depth: 0,
        }];

        while let Some(Pending { node, rows, depth }) = stack.pop() {
            let depth_left = params.max_depth.is_none_or(|d| depth < d);
            if !depth_left || rows.len() < params.min_samples_split.max(2) || is_pure(y, &rows) {
                continue;
            }
            let Some(split) = best_split(x, y, &rows) else {
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&r| x[(r, split.feature)] <= split.threshold);

            let l = tree.push_leaf(mean_at(y, &left_rows));
            let r = tree.push_leaf(mean_at(y, &right_rows));
            tree.left[node] = l as i64;
            tree.right[node] = r as i64;
            tree.feature[node] = split.feature as i64;
            tree.threshold[node] = split.threshold;

            stack.push(Pending {
                node: r,
                rows: right_rows,
                depth: depth + 1,
            });
            stack.push(Pending {
                node: l,
                rows: left_rows,
                depth: depth + 1,
            });
        }
        tree
    }

    pub fn n_nodes(&self) -> usize {
        self.value.len()
    }

    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.n_nodes()];
        for i in 0..self.n_nodes() {
            if let Some((l, r)) = self.children(i) {
                depths[l] = depths[i] + 1;
                depths[r] = depths[i] + 1;
            }
        }
        depths.into_iter().max().unwrap_or(0)
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.walk(|f| row[f])
    }

    /// Prediction for row `r` of `x`.
    pub fn predict_at(&self, x: &DMatrix<f64>, r: usize) -> f64 {
        self.walk(|f| x[(r, f)])
    }

    /// Structural check for tables read from disk.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.n_nodes();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [self.left.len(), self.right.len(), self.feature.len(), self.threshold.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err("node arrays differ in length".into());
        }

        for i in 0..n {
            if !self.value[i].is_finite() {
                return Err(format!("node {i} has a non-finite value"));
            }
            let (l, r) = (self.left[i], self.right[i]);
            if l == LEAF && r == LEAF {
                continue;
            }
            let in_range = |c: i64| c > i as i64 && (c as usize) < n;
            if !in_range(l) || !in_range(r) {
                return Err(format!("node {i} has invalid children ({l}, {r})"));
            }
            if self.feature[i] < 0 || self.feature[i] as usize >= n_features {
                return Err(format!("node {i} splits on unknown feature {}", self.feature[i]));
            }
            if !self.threshold[i].is_finite() {
                return Err(format!("node {i} has a non-finite threshold"));
            }
        }
        Ok(())
    }

    fn walk<F>(&self, feature_value: F) -> f64
    where
        F: Fn(usize) -> f64,
    {
        let mut node = 0;
        while let Some((l, r)) = self.children(node) {
            let f = self.feature[node] as usize;
            node = if feature_value(f) <= self.threshold[node] { l } else { r };
        }
        self.value[node]
    }

    fn children(&self, node: usize) -> Option<(usize, usize)> {
        let (l, r) = (self.left[node], self.right[node]);
        (l != LEAF && r != LEAF).then_some((l as usize, r as usize))
    }

    fn push_leaf(&mut self, value: f64) -> usize {
        self.left.push(LEAF);
        self.right.push(LEAF);
        self.feature.push(LEAF);
        self.threshold.push(0.0);
        self.value.push(value);
        self.value.len() - 1
    }
}

/// Best squared-error split over all features, or `None` when every feature
/// is constant on `rows`.
///
/// Minimising the children's summed squared error is the same as maximising
/// `S_l²/n_l + S_r²/n_r` with `S` the target sums, which is what we scan for.
/// Ties keep the first feature and the lowest threshold.
fn best_split(x: &DMatrix<f64>, y: &[f64], rows: &[usize]) -> Option<Split> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let mut best: Option<(f64, Split)> = None;
    let mut order = rows.to_vec();

    for f in 0..x.ncols() {
        order.sort_by(|&a, &b| x[(a, f)].partial_cmp(&x[(b, f)]).unwrap_or(Ordering::Equal));

        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += y[order[i]];
            let lo = x[(order[i], f)];
            let hi = x[(order[i + 1], f)];
            if lo >= hi {
                continue;
            }

            let n_l = (i + 1) as f64;
            let n_r = (n - i - 1) as f64;
            let right_sum = total - left_sum;
            let proxy = left_sum * left_sum / n_l + right_sum * right_sum / n_r;

            if best.as_ref().is_none_or(|(b, _)| proxy > *b) {
                best = Some((
                    proxy,
                    Split {
                        feature: f,
                        threshold: midpoint(lo, hi),
                    },
                ));
            }
        }
    }
    best.map(|(_, s)| s)
}

/// Midpoint that still separates `lo` from `hi` for adjacent floats.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi { lo } else { mid }
}

fn mean_at(y: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}

fn is_pure(y: &[f64], rows: &[usize]) -> bool {
    rows.windows(2).all(|w| y[w[0]] == y[w[1]])
}
