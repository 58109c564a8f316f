//! Majority-class reference model.

use serde::{Deserialize, Serialize};

/// Always predicts the most frequent training label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorityBaseline {
    pub n_classes: usize,
    pub majority_class: usize,
}

impl MajorityBaseline {
    /// Fit on training labels; the smaller label wins ties.
    pub fn fit(y: &[usize]) -> Result<Self, String> {
        if y.is_empty() {
            return Err("Empty dataset".to_string());
        }
        let n_classes = super::tree::n_classes_for(y);
        let mut counts = vec![0usize; n_classes];
        for &label in y {
            counts[label] += 1;
        }
        let mut majority_class = 0;
        for (class, &count) in counts.iter().enumerate() {
            if count > counts[majority_class] {
                majority_class = class;
            }
        }
        Ok(Self {
            n_classes,
            majority_class,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.n_classes < 2 || self.majority_class >= self.n_classes {
            return Err("Baseline class out of range".to_string());
        }
        Ok(())
    }

    pub fn predict(&self, _features: &[f64]) -> usize {
        self.majority_class
    }

    /// One-hot on the majority class.
    pub fn predict_proba(&self, _features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        proba[self.majority_class] = 1.0;
        proba
    }
}
