//! CART decision tree classifier.
//!
//! Gini splits over weighted samples with depth and leaf-size limits,
//! optional balanced class weights and random feature subsets. Models
//! serialize to JSON and render as indented text rules.

mod model;
mod train;

pub use model::{DecisionTreeModel, Split, TreeNode};
pub use train::{ClassWeight, MaxFeatures, TreeOptions, class_weights, train_decision_tree};

pub(crate) use model::{argmax, normalize};
pub(crate) use train::{fit_weighted, n_classes_for};
