use std::path::PathBuf;

use super::PipelineError;
use crate::analysis::{Exploration, explore_incidents, write_exploration};
use crate::config::PipelineConfig;
use crate::dataset::export::ensure_dir;
use crate::dataset::{DatasetLoadError, load_incidents};

#[derive(Debug)]
pub struct ExploreOutcome {
    pub exploration: Exploration,
    pub written: Vec<PathBuf>,
}

/// Describe the raw dataset and write the understanding reports.
pub fn explore(config: &PipelineConfig) -> Result<ExploreOutcome, PipelineError> {
    let dir = &config.output.dir;
    ensure_dir(dir)?;
    let table = load_incidents(&config.input.path, &config.input.columns)?;
    let exploration = explore_incidents(&table).ok_or(DatasetLoadError::Empty)?;
    let written = write_exploration(dir, &exploration, &config.criteria)?;
    tracing::info!("Explore stage wrote {} files", written.len());
    Ok(ExploreOutcome {
        exploration,
        written,
    })
}
