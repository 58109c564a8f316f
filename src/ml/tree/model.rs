use serde::{Deserialize, Serialize};
use std::path::Path;

/// Internal split of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Feature index used for the split.
    pub feature: usize,
    /// Samples with `feature <= threshold` go left.
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

/// A node of a fitted tree, stored in depth-first order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// `None` for leaves.
    pub split: Option<Split>,
    /// Weighted class totals of the training samples reaching the node.
    pub value: Vec<f64>,
    /// Unweighted number of training rows reaching the node.
    pub samples: usize,
    /// Weighted Gini impurity of the node.
    pub impurity: f64,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }

    /// Index of the heaviest class, first on ties.
    pub fn majority_class(&self) -> usize {
        argmax(&self.value)
    }
}

/// CART classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeModel {
    /// Model format version.
    pub model_version: i64,
    pub n_features: usize,
    pub n_classes: usize,
    /// Root first; children always follow their parent.
    pub nodes: Vec<TreeNode>,
    /// Normalized Gini importances, one per feature.
    pub feature_importances: Vec<f64>,
}

impl DecisionTreeModel {
    /// Validate structural invariants of the model.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_classes < 2 {
            return Err("Model must contain at least 2 classes".to_string());
        }
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if self.feature_importances.len() != self.n_features {
            return Err(format!(
                "feature_importances has {} entries but expected {}",
                self.feature_importances.len(),
                self.n_features
            ));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.value.len() != self.n_classes {
                return Err(format!(
                    "Node {idx} has {} class totals but expected {}",
                    node.value.len(),
                    self.n_classes
                ));
            }
            if let Some(split) = &node.split {
                if split.feature >= self.n_features {
                    return Err(format!("Node {idx} splits on unknown feature {}", split.feature));
                }
                if !split.threshold.is_finite() {
                    return Err(format!("Node {idx} has a non-finite threshold"));
                }
                for child in [split.left, split.right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("Node {idx} has invalid child index {child}"));
                    }
                }
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

    fn leaf_for(&self, features: &[f64]) -> &TreeNode {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let Some(split) = &node.split else {
                return node;
            };
            let value = features.get(split.feature).copied().unwrap_or(0.0);
            idx = if value <= split.threshold {
                split.left
            } else {
                split.right
            };
        }
    }

    /// Class probabilities from the reached leaf's weighted totals.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        normalize(&self.leaf_for(features).value)
    }

    pub fn predict(&self, features: &[f64]) -> usize {
        self.leaf_for(features).majority_class()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    /// Longest root-to-leaf path in edges; 0 for a single leaf.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            max_depth = max_depth.max(depths[idx]);
            if let Some(split) = &node.split {
                depths[split.left] = depths[idx] + 1;
                depths[split.right] = depths[idx] + 1;
            }
        }
        max_depth
    }

    /// Render the tree as indented rules.
    pub fn export_text(&self, feature_names: &[&str]) -> String {
        let mut out = String::new();
        self.render_node(0, 0, feature_names, &mut out);
        out
    }

    fn render_node(&self, idx: usize, depth: usize, names: &[&str], out: &mut String) {
        let indent = "|   ".repeat(depth);
        let node = &self.nodes[idx];
        match &node.split {
            None => {
                out.push_str(&format!(
                    "{indent}|--- class: {} (samples: {})\n",
                    node.majority_class(),
                    node.samples
                ));
            }
            Some(split) => {
                let name = names
                    .get(split.feature)
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| format!("feature_{}", split.feature));
                out.push_str(&format!("{indent}|--- {name} <= {:.2}\n", split.threshold));
                self.render_node(split.left, depth + 1, names, out);
                out.push_str(&format!("{indent}|--- {name} >  {:.2}\n", split.threshold));
                self.render_node(split.right, depth + 1, names, out);
            }
        }
    }
}

/// Scale non-negative totals to sum 1; uniform when all are zero.
pub(crate) fn normalize(values: &[f64]) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        if values.is_empty() {
            return Vec::new();
        }
        return vec![1.0 / values.len() as f64; values.len()];
    }
    values.iter().map(|v| v / sum).collect()
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> DecisionTreeModel {
        DecisionTreeModel {
            model_version: 1,
            n_features: 2,
            n_classes: 2,
            nodes: vec![
                TreeNode {
                    split: Some(Split {
                        feature: 1,
                        threshold: 0.5,
                        left: 1,
                        right: 2,
                    }),
                    value: vec![3.0, 3.0],
                    samples: 6,
                    impurity: 0.5,
                },
                TreeNode {
                    split: None,
                    value: vec![3.0, 1.0],
                    samples: 4,
                    impurity: 0.375,
                },
                TreeNode {
                    split: None,
                    value: vec![0.0, 2.0],
                    samples: 2,
                    impurity: 0.0,
                },
            ],
            feature_importances: vec![0.0, 1.0],
        }
    }

    #[test]
    fn predicts_through_threshold() {
        let tree = stump();
        assert_eq!(tree.predict(&[9.0, 0.5]), 0);
        assert_eq!(tree.predict(&[9.0, 0.6]), 1);
        assert_eq!(tree.predict_proba(&[0.0, 0.0]), vec![0.75, 0.25]);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.n_nodes(), 3);
    }

    #[test]
    fn validate_rejects_backward_children() {
        let mut tree = stump();
        tree.validate().unwrap();
        if let Some(split) = tree.nodes[0].split.as_mut() {
            split.left = 0;
        }
        assert!(tree.validate().is_err());

        let mut tree = stump();
        tree.nodes[2].value.pop();
        assert!(tree.validate().is_err());
    }

    #[test]
    fn export_text_lists_rules() {
        let text = stump().export_text(&["a", "b"]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "|--- b <= 0.50");
        assert_eq!(lines[1], "|   |--- class: 0 (samples: 4)");
        assert_eq!(lines[2], "|--- b >  0.50");
        assert_eq!(lines[3], "|   |--- class: 1 (samples: 2)");
    }

    #[test]
    fn json_round_trip_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, serde_json::to_vec(&stump()).unwrap()).unwrap();
        assert_eq!(DecisionTreeModel::load_json(&path).unwrap(), stump());
    }

    #[test]
    fn normalize_handles_empty_leaf() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.5, 0.5]);
    }
}
