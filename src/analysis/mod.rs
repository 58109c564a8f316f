//! Descriptive analysis of the raw data and business reports on model output.

pub mod explore;
pub mod insights;
mod stats;

pub use explore::{Exploration, explore_incidents, write_exploration};
pub use insights::{Evaluation, EvaluationInputs, evaluate_predictions, write_evaluation};
