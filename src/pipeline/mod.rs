//! Stage orchestration: each stage reads the config, works inside
//! `output.dir` and hands back what it produced.

mod evaluate;
mod explore;
mod predict;
mod prepare;
mod train;

use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};
use crate::dataset::export::ExportError;
use crate::dataset::{DatasetLoadError, SplitError};

pub use evaluate::{EvaluateOutcome, evaluate};
pub use explore::{ExploreOutcome, explore};
pub use predict::{PredictOutcome, ScoredFeatureRow, predict};
pub use prepare::{PREPARATION_SUMMARY_FILE, PrepareOutcome, prepare};
pub use train::{
    CLASSIFICATION_REPORT_FILE, COMPARISON_FILE, IMPORTANCE_FILE, MODEL_FILE, MODEL_INFO_FILE,
    PREDICTIONS_FILE, ROC_FILE, TREE_STRUCTURE_FILE, TrainOutcome, train,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] DatasetLoadError),
    #[error("split failed: {0}")]
    Split(#[from] SplitError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("model error: {0}")]
    Model(String),
    #[error("evaluation error: {0}")]
    Analysis(String),
}

/// Outcomes of every stage of a full run.
#[derive(Debug)]
pub struct RunOutcome {
    pub explore: ExploreOutcome,
    pub prepare: PrepareOutcome,
    pub train: TrainOutcome,
    pub evaluate: EvaluateOutcome,
}

/// Run explore, prepare, train and evaluate in order.
pub fn run_all(config: &PipelineConfig) -> Result<RunOutcome, PipelineError> {
    let explore = explore(config)?;
    let prepare = prepare(config)?;
    let train = train(config)?;
    let evaluate = evaluate(config)?;
    tracing::info!(
        "Pipeline finished; best model {} written to {}",
        train.best_model,
        config.output.dir.display()
    );
    Ok(RunOutcome {
        explore,
        prepare,
        train,
        evaluate,
    })
}
