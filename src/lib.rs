//! Library exports for the pipeline binaries, benchmarks and tests.
/// Application directory resolution.
pub mod app_dirs;
/// Pipeline configuration loading.
pub mod config;
/// Tracing setup.
pub mod logging;
/// Incident loading, feature engineering and split export.
pub mod dataset;
/// Tree models, metrics and model comparison.
pub mod ml;
/// Exploratory statistics and business reports.
pub mod analysis;
/// Stage orchestration.
pub mod pipeline;
