//! Pipeline configuration loaded from `regionrisk.toml`.
//!
//! Every section has defaults, so a config file only needs the keys it
//! changes. Lookup order is an explicit path, then the file in the app
//! root, then built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::AppHome;

/// File name of the shared config inside the app root.
pub const CONFIG_FILE_NAME: &str = "regionrisk.toml";

/// Errors that may occur while loading pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// A value is outside its accepted range.
    #[error("Invalid config value for {key}: {message}")]
    InvalidValue {
        /// Dotted key of the offending value.
        key: &'static str,
        /// Explanation of the constraint.
        message: String,
    },
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub split: SplitConfig,
    pub cross_validation: CrossValidationConfig,
    pub grid: GridConfig,
    pub forest: ForestConfig,
    pub criteria: SuccessCriteria,
}

/// Location and header layout of the raw incident CSV.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    pub columns: ColumnNames,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("jml_kejadian_bunuh_diri__des_kel.csv"),
            columns: ColumnNames::default(),
        }
    }
}

/// Header names for the columns the loader needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnNames {
    pub province: String,
    pub regency: String,
    pub district: String,
    pub village: String,
    pub incidents: String,
    pub year: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            province: "nama_provinsi".to_string(),
            regency: "bps_nama_kabupaten_kota".to_string(),
            district: "bps_nama_kecamatan".to_string(),
            village: "bps_nama_desa_kelurahan".to_string(),
            incidents: "jumlah_kejadian".to_string(),
            year: "tahun".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives every stage artifact.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrossValidationConfig {
    pub folds: usize,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self { folds: 5 }
    }
}

/// Hyperparameter grid for the pruned decision tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub max_depth: Vec<usize>,
    /// Also try a tree without a depth limit (searched last).
    pub include_unlimited_depth: bool,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_depth: vec![3, 5, 7, 10],
            include_unlimited_depth: true,
            min_samples_split: vec![2, 5, 10, 20],
            min_samples_leaf: vec![1, 2, 5, 10],
        }
    }
}

impl GridConfig {
    /// Depth candidates in search order; `None` means unlimited.
    pub fn depth_candidates(&self) -> Vec<Option<usize>> {
        let mut depths: Vec<Option<usize>> = self.max_depth.iter().copied().map(Some).collect();
        if self.include_unlimited_depth {
            depths.push(None);
        }
        depths
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub balanced: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 10,
            min_samples_leaf: 5,
            balanced: true,
            seed: 42,
        }
    }
}

/// Minimum test-set scores the selected model should reach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuccessCriteria {
    pub min_precision: f64,
    pub min_recall: f64,
    pub min_f1: f64,
    pub min_roc_auc: f64,
}

impl Default for SuccessCriteria {
    fn default() -> Self {
        Self {
            min_precision: 0.60,
            min_recall: 0.50,
            min_f1: 0.55,
            min_roc_auc: 0.70,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve config from an explicit path, the app home, or defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with(explicit, AppHome::locate().ok().as_ref())
    }

    /// Like [`PipelineConfig::resolve`], with the app home given.
    pub fn resolve_with(explicit: Option<&Path>, home: Option<&AppHome>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = home.map(|home| home.root().join(CONFIG_FILE_NAME)) {
            if path.is_file() {
                tracing::info!("Using config at {}", path.display());
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Apply `--input` / `--out-dir` style overrides on top of a loaded config.
    pub fn with_overrides(mut self, input: Option<PathBuf>, out_dir: Option<PathBuf>) -> Self {
        if let Some(path) = input {
            self.input.path = path;
        }
        if let Some(dir) = out_dir {
            self.output.dir = dir;
        }
        self
    }

    /// Check value ranges that would otherwise fail deep inside a stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "split.test_fraction",
                message: format!("{fraction} is not inside (0, 1)"),
            });
        }
        if self.cross_validation.folds < 2 {
            return Err(ConfigError::InvalidValue {
                key: "cross_validation.folds",
                message: "at least 2 folds are required".to_string(),
            });
        }
        if self.grid.depth_candidates().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "grid.max_depth",
                message: "no depth candidates".to_string(),
            });
        }
        if self.grid.max_depth.contains(&0) {
            return Err(ConfigError::InvalidValue {
                key: "grid.max_depth",
                message: "depths must be positive".to_string(),
            });
        }
        if self.grid.min_samples_split.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "grid.min_samples_split",
                message: "needs at least one value".to_string(),
            });
        }
        if self.grid.min_samples_split.iter().any(|&v| v < 2) {
            return Err(ConfigError::InvalidValue {
                key: "grid.min_samples_split",
                message: "values must be >= 2".to_string(),
            });
        }
        if self.grid.min_samples_leaf.is_empty() || self.grid.min_samples_leaf.contains(&0) {
            return Err(ConfigError::InvalidValue {
                key: "grid.min_samples_leaf",
                message: "needs at least one positive value".to_string(),
            });
        }
        if self.forest.n_trees == 0 {
            return Err(ConfigError::InvalidValue {
                key: "forest.n_trees",
                message: "at least one tree is required".to_string(),
            });
        }
        if self.forest.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "forest.max_depth",
                message: "must be positive".to_string(),
            });
        }
        if self.forest.min_samples_split < 2 {
            return Err(ConfigError::InvalidValue {
                key: "forest.min_samples_split",
                message: "must be >= 2".to_string(),
            });
        }
        if self.forest.min_samples_leaf == 0 {
            return Err(ConfigError::InvalidValue {
                key: "forest.min_samples_leaf",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
