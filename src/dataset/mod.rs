//! Dataset loading, feature engineering and train/test preparation.

pub mod aggregate;
pub mod export;
pub mod features;
pub mod loader;
pub mod split;

pub use features::{
    CLASS_NAMES, FEATURE_COUNT, FEATURE_NAMES, FeatureCategory, FeatureRow, FeatureTable, Features,
    RegencyEncoder, build_feature_table,
};
pub use loader::{
    DatasetLoadError, IncidentRecord, IncidentTable, MissingValueReport, load_incidents,
};
pub use split::{SplitError, TrainTestIndices, stratified_k_fold, stratified_train_test_split};
