use crate::domain::model::{AdapterKind, OutputFormat, ScanMode};
use crate::utils::error::{Result, TallyError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional TOML config file. Every field is optional: values fill in for
/// flags the command line leaves unset, and built-in defaults cover the rest.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub input_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub processes: Option<usize>,
    pub limit: Option<i64>,
    pub mode: Option<ScanMode>,
    pub format: Option<OutputFormat>,
    pub adapter: Option<AdapterKind>,
    pub budget_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| TallyError::ConfigFileError {
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| TallyError::ConfigFileError {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&raw)
    }
}
