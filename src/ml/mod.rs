//! Machine learning helpers for training and inference.
//!
//! Tree-family classifiers, their metrics and the model comparison used by
//! the train stage. Everything is implemented in-crate and trains
//! deterministically for a given seed.

pub mod baseline;
pub mod forest;
pub mod metrics;
pub mod model;
mod parallel;
pub mod selection;
pub mod tree;

pub use model::{ModelArtifact, TrainedModel};
