//! Binary logistic gradient boosting over histogram-binned features.
//!
//! Each tree is grown depth-first with second-order leaf weights
//! `-G / (H + lambda)`. Candidate thresholds come from per-feature
//! quantile cuts computed once on the training matrix. Split search
//! runs across features in parallel and is reduced in feature order, so
//! a fixed seed always produces the same model.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ModelError;

const MIN_HESSIAN: f64 = 1e-16;
const MIN_GAIN: f64 = 1e-12;
const PROB_EPS: f64 = 1e-7;
/// Bin indices are stored as `u16`, cuts included.
const MAX_BINS: usize = u16::MAX as usize;

pub trait Classifier {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError>;

    /// Probability of the positive class for every row.
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    /// One non-negative score per feature, summing to 1 (or all zero).
    fn feature_importances(&self) -> Result<Vec<f64>, ModelError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            max_depth: 6,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample_bytree: 0.9,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            max_bins: 64,
            seed: 42,
        }
    }
}

impl GbdtParams {
    /// Smaller, more heavily subsampled ensemble used for the team baseline.
    pub fn team_baseline() -> Self {
        Self {
            n_estimators: 300,
            subsample: 0.8,
            colsample_bytree: 0.8,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub feature_index: usize,
    /// Rows with `x <= threshold` go left; NaN goes right.
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    /// Set on leaves only, already scaled by the learning rate.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if let Some(value) = node.value {
                return value;
            }
            let x = row.get(node.feature_index).copied().unwrap_or(f64::NAN);
            idx = if x <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }
}

#[derive(Debug, Clone)]
pub struct GbdtClassifier {
    params: GbdtParams,
    base_margin: f64,
    trees: Vec<Tree>,
    n_features: Option<usize>,
    gains: Vec<f64>,
}

impl GbdtClassifier {
    pub fn new(params: GbdtParams) -> Self {
        Self {
            params,
            base_margin: 0.0,
            trees: Vec::new(),
            n_features: None,
            gains: Vec::new(),
        }
    }

    pub fn params(&self) -> &GbdtParams {
        &self.params
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    fn margin(&self, row: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

impl Classifier for GbdtClassifier {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError> {
        if features.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.len() != labels.len() {
            return Err(ModelError::LabelMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let n_features = check_width(features, features[0].len())?;
        let n_rows = features.len();

        let max_bins = bin_budget(self.params.max_bins);
        let cuts: Vec<Vec<f64>> = (0..n_features)
            .into_par_iter()
            .map(|f| quantile_cuts(features.iter().map(|r| r[f]), max_bins))
            .collect();
        let binned: Vec<Vec<u16>> = (0..n_features)
            .into_par_iter()
            .map(|f| features.iter().map(|r| bin_of(&cuts[f], r[f])).collect())
            .collect();

        let targets: Vec<f64> = labels.iter().map(|&y| f64::from(y.min(1))).collect();
        let positive = targets.iter().sum::<f64>() / n_rows as f64;
        let prior = positive.clamp(PROB_EPS, 1.0 - PROB_EPS);
        self.base_margin = (prior / (1.0 - prior)).ln();
        self.trees = Vec::with_capacity(self.params.n_estimators);
        self.gains = vec![0.0; n_features];
        self.n_features = Some(n_features);

        let mut margins = vec![self.base_margin; n_rows];
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let n_rows_tree = fraction_count(n_rows, self.params.subsample);
        let n_cols_tree = fraction_count(n_features, self.params.colsample_bytree);

        info!(
            rows = n_rows,
            features = n_features,
            trees = self.params.n_estimators,
            "fitting gradient boosted trees"
        );

        for tree_idx in 0..self.params.n_estimators {
            let mut grad = Vec::with_capacity(n_rows);
            let mut hess = Vec::with_capacity(n_rows);
            for (&m, &y) in margins.iter().zip(&targets) {
                let p = sigmoid(m);
                grad.push(p - y);
                hess.push((p * (1.0 - p)).max(MIN_HESSIAN));
            }

            let mut rows = sample(&mut rng, n_rows, n_rows_tree).into_vec();
            rows.sort_unstable();
            let mut cols = sample(&mut rng, n_features, n_cols_tree).into_vec();
            cols.sort_unstable();

            let builder = TreeBuilder {
                params: &self.params,
                cuts: &cuts,
                binned: &binned,
                grad: &grad,
                hess: &hess,
                features: &cols,
            };
            let mut nodes = Vec::new();
            builder.grow(&rows, 0, &mut nodes, &mut self.gains);
            let tree = Tree { nodes };

            for (m, row) in margins.iter_mut().zip(features) {
                *m += tree.predict(row);
            }
            if (tree_idx + 1) % 50 == 0 {
                debug!("tree {}/{}", tree_idx + 1, self.params.n_estimators);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let n_features = self.n_features.ok_or(ModelError::NotFitted)?;
        check_width(features, n_features)?;
        Ok(features.iter().map(|r| sigmoid(self.margin(r))).collect())
    }

    fn feature_importances(&self) -> Result<Vec<f64>, ModelError> {
        if self.n_features.is_none() {
            return Err(ModelError::NotFitted);
        }
        let total: f64 = self.gains.iter().sum();
        if total <= 0.0 {
            return Ok(vec![0.0; self.gains.len()]);
        }
        Ok(self.gains.iter().map(|g| g / total).collect())
    }
}

fn check_width(features: &[Vec<f64>], expected: usize) -> Result<usize, ModelError> {
    for (row, values) in features.iter().enumerate() {
        if values.len() != expected {
            return Err(ModelError::RaggedFeatures {
                expected,
                row,
                actual: values.len(),
            });
        }
    }
    Ok(expected)
}

fn fraction_count(n: usize, fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let k = (n as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
    k.clamp(1, n)
}

fn bin_budget(max_bins: usize) -> usize {
    max_bins.clamp(2, MAX_BINS)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Split thresholds for one feature: midpoints between distinct values
/// when there are few of them, otherwise evenly spaced quantiles.
fn quantile_cuts(values: impl Iterator<Item = f64>, max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    if sorted.len() < 2 {
        return Vec::new();
    }
    if sorted.len() <= max_bins {
        return sorted.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }
    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|i| sorted[i * (sorted.len() - 1) / max_bins])
        .collect();
    cuts.dedup();
    if cuts.last() == sorted.last() {
        cuts.pop();
    }
    cuts
}

/// Index of the first cut `>= value`; `cuts.len()` when above every cut.
fn bin_of(cuts: &[f64], value: f64) -> u16 {
    if value.is_nan() {
        return cuts.len() as u16;
    }
    cuts.partition_point(|&c| c < value) as u16
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct TreeBuilder<'a> {
    params: &'a GbdtParams,
    cuts: &'a [Vec<f64>],
    binned: &'a [Vec<u16>],
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
}

impl TreeBuilder<'_> {
    fn grow(
        &self,
        rows: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        gains: &mut [f64],
    ) -> usize {
        let current = nodes.len();
        let (g, h) = self.sums(rows);
        let leaf = Node {
            feature_index: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(-g / (h + self.params.reg_lambda) * self.params.learning_rate),
        };

        if depth >= self.params.max_depth || h < 2.0 * self.params.min_child_weight {
            nodes.push(leaf);
            return current;
        }
        let Some(split) = self.best_split(rows, g, h) else {
            nodes.push(leaf);
            return current;
        };

        let column = &self.binned[split.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| usize::from(column[r]) <= split.bin);

        gains[split.feature] += split.gain;
        nodes.push(Node {
            feature_index: split.feature,
            threshold: self.cuts[split.feature][split.bin],
            left: 0,
            right: 0,
            value: None,
        });
        let left = self.grow(&left_rows, depth + 1, nodes, gains);
        let right = self.grow(&right_rows, depth + 1, nodes, gains);
        nodes[current].left = left;
        nodes[current].right = right;
        current
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]))
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<Split> {
        let candidates: Vec<Split> = self
            .features
            .par_iter()
            .filter_map(|&f| self.best_split_for(f, rows, g, h))
            .collect();
        // Ties resolve to the lowest feature, then the lowest bin.
        candidates.into_iter().fold(None, |best, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    fn best_split_for(&self, feature: usize, rows: &[usize], g: f64, h: f64) -> Option<Split> {
        let cuts = &self.cuts[feature];
        if cuts.is_empty() {
            return None;
        }
        let column = &self.binned[feature];
        let mut hist = vec![(0.0f64, 0.0f64); cuts.len() + 1];
        for &r in rows {
            let slot = &mut hist[usize::from(column[r])];
            slot.0 += self.grad[r];
            slot.1 += self.hess[r];
        }

        let lambda = self.params.reg_lambda;
        let parent = g * g / (h + lambda);
        let mut best: Option<Split> = None;
        let (mut gl, mut hl) = (0.0, 0.0);
        for (bin, &(bg, bh)) in hist.iter().enumerate().take(cuts.len()) {
            gl += bg;
            hl += bh;
            let (gr, hr) = (g - gl, h - hl);
            if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                continue;
            }
            let gain = 0.5 * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent);
            if gain > MIN_GAIN && best.is_none_or(|b| gain > b.gain) {
                best = Some(Split { feature, bin, gain });
            }
        }
        best
    }
}
