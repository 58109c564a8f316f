//! The `.regionrisk` home directory holding the shared config file and the
//! run logs. `REGIONRISK_HOME` replaces the OS config directory as its base.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory under the base directory.
pub const APP_DIR_NAME: &str = ".regionrisk";

/// Environment variable that replaces the OS config directory.
pub const HOME_ENV_VAR: &str = "REGIONRISK_HOME";

const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config directory available; set {HOME_ENV_VAR}")]
    NoBaseDir,
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Location of the application directory. Nothing is created until a
/// subdirectory is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHome {
    root: PathBuf,
}

impl AppHome {
    /// `REGIONRISK_HOME` when set and non-empty, else the OS config directory.
    pub fn locate() -> Result<Self, AppDirError> {
        let base = std::env::var_os(HOME_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
            .ok_or(AppDirError::NoBaseDir)?;
        Ok(Self::under(&base))
    }

    pub fn under(base: &Path) -> Self {
        Self {
            root: base.join(APP_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The logs directory, created if missing.
    pub fn logs_dir(&self) -> Result<PathBuf, AppDirError> {
        let path = self.root.join(LOGS_DIR_NAME);
        std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
