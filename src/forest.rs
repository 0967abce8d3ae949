//! Bagged ensemble of [`linfa-trees`](https://crates.io/crates/linfa-trees)
//! decision trees.
//!
//! Each tree is grown on a bootstrap sample drawn from a seeded RNG, so the
//! same data and seed always give the same forest. Prediction is a majority
//! vote; the vote fractions double as class probabilities.

use crate::error::{ObesityError, Result};
use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Ensemble size, bootstrap seed and tree depth limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    /// `None` grows each tree until its leaves are pure.
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            seed: 42,
            max_depth: None,
        }
    }
}

/// Fitted trees voting over class indices.
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree<f64, usize>>,
    n_classes: usize,
    n_features: usize,
}

/// Fits the ensemble on an encoded matrix and class indices in
/// `0..n_classes`.
pub fn fit_classifier(
    x: &Array2<f64>,
    y: &Array1<usize>,
    n_classes: usize,
    params: &ForestParams,
) -> Result<RandomForest> {
    let n = x.nrows();
    if n == 0 || n != y.len() {
        return Err(ObesityError::Training(format!(
            "{} rows for {} labels",
            n,
            y.len()
        )));
    }
    if params.n_trees == 0 {
        return Err(ObesityError::InvalidInput(
            "forest needs at least one tree".into(),
        ));
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(ObesityError::Training(format!(
            "class index {bad} outside 0..{n_classes}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut trees = Vec::with_capacity(params.n_trees);
    for i in 0..params.n_trees {
        let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
        let dataset = Dataset::new(x.select(Axis(0), &sample), y.select(Axis(0), &sample));

        let tree = DecisionTree::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(params.max_depth)
            .fit(&dataset)
            .map_err(|e| ObesityError::Training(format!("tree {i}: {e}")))?;
        trees.push(tree);
    }
    debug!("grew {} trees on {n} rows", trees.len());

    Ok(RandomForest {
        trees,
        n_classes,
        n_features: x.ncols(),
    })
}

impl RandomForest {
    /// Number of fitted trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Width of the encoded matrix the trees were grown on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Per-row vote fractions, one column per class.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(ObesityError::SchemaMismatch(format!(
                "encoded width {} but forest expects {}",
                x.ncols(),
                self.n_features
            )));
        }
        let x = x.to_owned();
        let mut votes = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for tree in &self.trees {
            let pred: Array1<usize> = tree.predict(&x);
            for (row, &class) in pred.iter().enumerate() {
                votes[[row, class]] += 1.0;
            }
        }
        votes /= self.trees.len() as f64;
        Ok(votes)
    }

    /// Class index with the most votes per row; ties go to the lower index.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| argmax(row.iter().copied()))
            .collect())
    }
}

pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}
