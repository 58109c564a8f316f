//! Bagged ensemble of CART trees.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::parallel::map_ordered;
use super::tree::{
    ClassWeight, DecisionTreeModel, MaxFeatures, TreeOptions, class_weights, fit_weighted,
    n_classes_for,
};

/// Training hyperparameters for a random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestOptions {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub class_weight: ClassWeight,
    pub seed: u64,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: Some(10),
            min_samples_split: 10,
            min_samples_leaf: 5,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        }
    }
}

/// Random forest classifier averaging tree probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    /// Model format version.
    pub model_version: i64,
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTreeModel>,
    /// Mean of the per-tree normalized importances.
    pub feature_importances: Vec<f64>,
}

impl RandomForestModel {
    /// Validate structural invariants of the model and every tree.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("Forest has no trees".to_string());
        }
        if self.feature_importances.len() != self.n_features {
            return Err("feature_importances length must match n_features".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|err| format!("Tree {idx}: {err}"))?;
            if tree.n_features != self.n_features || tree.n_classes != self.n_classes {
                return Err(format!("Tree {idx} shape does not match the forest"));
            }
        }
        Ok(())
    }

    /// Load a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|err| err.to_string())?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|err| err.to_string())?;
        model.validate()?;
        Ok(model)
    }

    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut mean = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in mean.iter_mut().zip(tree.predict_proba(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for v in &mut mean {
            *v /= n;
        }
        mean
    }

    pub fn predict(&self, features: &[f64]) -> usize {
        super::tree::argmax(&self.predict_proba(features))
    }
}

struct TreeJob {
    bootstrap_seed: u64,
    split_seed: u64,
}

/// Fit `n_trees` bootstrapped trees with `sqrt` feature sampling.
pub fn train_random_forest(
    x: &[Vec<f64>],
    y: &[usize],
    options: &ForestOptions,
) -> Result<RandomForestModel, String> {
    if options.n_trees == 0 {
        return Err("n_trees must be positive".to_string());
    }
    if x.len() != y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    let n = x.len();
    let n_classes = n_classes_for(y);
    let weights = class_weights(y, n_classes, options.class_weight);

    // Seeds are fixed before spawning so results do not depend on scheduling.
    let mut master = StdRng::seed_from_u64(options.seed);
    let jobs: Vec<TreeJob> = (0..options.n_trees)
        .map(|_| TreeJob {
            bootstrap_seed: master.random(),
            split_seed: master.random(),
        })
        .collect();

    let trees = map_ordered(jobs, |job| {
        let mut rng = StdRng::seed_from_u64(job.bootstrap_seed);
        let mut multiplicity = vec![0u32; n];
        for _ in 0..n {
            multiplicity[rng.random_range(0..n)] += 1;
        }
        let sample_weight: Vec<f64> = y
            .iter()
            .zip(&multiplicity)
            .map(|(&label, &count)| weights[label] * f64::from(count))
            .collect();
        let tree_options = TreeOptions {
            max_depth: options.max_depth,
            min_samples_split: options.min_samples_split,
            min_samples_leaf: options.min_samples_leaf,
            class_weight: options.class_weight,
            max_features: MaxFeatures::Sqrt,
            seed: job.split_seed,
        };
        fit_weighted(x, y, &sample_weight, n_classes, &tree_options)
    })?;

    let n_features = trees[0].n_features;
    let mut feature_importances = vec![0.0; n_features];
    for tree in &trees {
        for (acc, v) in feature_importances.iter_mut().zip(&tree.feature_importances) {
            *acc += v;
        }
    }
    for v in &mut feature_importances {
        *v /= trees.len() as f64;
    }
    tracing::debug!("Trained random forest with {} trees", trees.len());
    Ok(RandomForestModel {
        model_version: 1,
        n_features,
        n_classes,
        trees,
        feature_importances,
    })
}
