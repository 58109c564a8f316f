//! Serializable wrapper over every trainable model kind.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::baseline::MajorityBaseline;
use super::forest::RandomForestModel;
use super::tree::DecisionTreeModel;

/// Current on-disk format of [`ModelArtifact`].
pub const ARTIFACT_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    Baseline(MajorityBaseline),
    DecisionTree(DecisionTreeModel),
    RandomForest(RandomForestModel),
}

impl TrainedModel {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Baseline(model) => model.validate(),
            Self::DecisionTree(model) => model.validate(),
            Self::RandomForest(model) => model.validate(),
        }
    }

    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        match self {
            Self::Baseline(model) => model.predict_proba(features),
            Self::DecisionTree(model) => model.predict_proba(features),
            Self::RandomForest(model) => model.predict_proba(features),
        }
    }

    pub fn predict(&self, features: &[f64]) -> usize {
        match self {
            Self::Baseline(model) => model.predict(features),
            Self::DecisionTree(model) => model.predict(features),
            Self::RandomForest(model) => model.predict(features),
        }
    }

    /// Probability of label 1.
    pub fn positive_probability(&self, features: &[f64]) -> f64 {
        self.predict_proba(features).get(1).copied().unwrap_or(0.0)
    }

    /// `None` for models without a notion of feature importance.
    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            Self::Baseline(_) => None,
            Self::DecisionTree(model) => Some(&model.feature_importances),
            Self::RandomForest(model) => Some(&model.feature_importances),
        }
    }

    pub fn as_tree(&self) -> Option<&DecisionTreeModel> {
        match self {
            Self::DecisionTree(model) => Some(model),
            _ => None,
        }
    }

    pub fn n_features(&self) -> Option<usize> {
        match self {
            Self::Baseline(_) => None,
            Self::DecisionTree(model) => Some(model.n_features),
            Self::RandomForest(model) => Some(model.n_features),
        }
    }
}

/// Selected model plus the metadata needed to score new rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: i64,
    /// Display name from the model comparison, e.g. `DT Pruned`.
    pub model_name: String,
    /// Feature columns in model input order.
    pub feature_names: Vec<String>,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(model_name: &str, feature_names: &[&str], model: TrainedModel) -> Self {
        Self {
            format_version: ARTIFACT_VERSION,
            model_name: model_name.to_string(),
            feature_names: feature_names.iter().map(|n| n.to_string()).collect(),
            model,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != ARTIFACT_VERSION {
            return Err(format!(
                "Unsupported model format version {} (expected {ARTIFACT_VERSION})",
                self.format_version
            ));
        }
        if let Some(n) = self.model.n_features() {
            if n != self.feature_names.len() {
                return Err(format!(
                    "Model expects {n} features but {} names are listed",
                    self.feature_names.len()
                ));
            }
        }
        self.model.validate()
    }

    pub fn save_json(&self, path: &Path) -> Result<(), String> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|err| err.to_string())?;
        std::fs::write(path, bytes).map_err(|err| format!("Write {}: {err}", path.display()))
    }

    /// Load a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, String> {
        let bytes =
            std::fs::read(path).map_err(|err| format!("Read {}: {err}", path.display()))?;
        let artifact: Self = serde_json::from_slice(&bytes).map_err(|err| err.to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::tree::{TreeOptions, train_decision_tree};

    #[test]
    fn artifact_round_trips_through_json() {
        let x = vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 0.0], vec![3.0, 0.0]];
        let y = vec![0, 0, 1, 1];
        let tree = train_decision_tree(&x, &y, &TreeOptions::default()).unwrap();
        let artifact = ModelArtifact::new("DT Basic", &["a", "b"], TrainedModel::DecisionTree(tree));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.json");
        artifact.save_json(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"kind\": \"decision_tree\""));

        let loaded = ModelArtifact::load_json(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.model.predict(&[3.0, 0.0]), 1);
        assert_eq!(loaded.model.positive_probability(&[0.0, 1.0]), 0.0);
    }

    #[test]
    fn feature_name_count_must_match() {
        let x = vec![vec![0.0], vec![1.0]];
        let tree = train_decision_tree(&x, &[0, 1], &TreeOptions::default()).unwrap();
        let artifact = ModelArtifact::new("DT Basic", &["a", "b"], TrainedModel::DecisionTree(tree));
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn baseline_has_no_importances() {
        let model = TrainedModel::Baseline(MajorityBaseline::fit(&[1, 1, 0]).unwrap());
        assert!(model.feature_importances().is_none());
        assert_eq!(model.positive_probability(&[]), 1.0);
    }
}
