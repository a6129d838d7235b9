pub mod file;

use crate::domain::model::{AdapterKind, OutputFormat, ScanMode};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, TallyError};
use crate::utils::validation::{validate_limit, validate_path, validate_positive_number, Validate};
use file::FileConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROCESSES: usize = 4;
pub const DEFAULT_LIMIT: i64 = -1;
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Fully resolved run configuration: command line over config file over
/// built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub processes: usize,
    pub limit: i64,
    pub mode: ScanMode,
    pub format: OutputFormat,
    pub adapter: AdapterKind,
    pub budget_secs: Option<u64>,
    pub verbose: bool,
    pub monitor: bool,
}

impl Settings {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            processes: DEFAULT_PROCESSES,
            limit: DEFAULT_LIMIT,
            mode: ScanMode::Counts,
            format: OutputFormat::Json,
            adapter: AdapterKind::Flat,
            budget_secs: None,
            verbose: false,
            monitor: false,
        }
    }
}

impl ConfigProvider for Settings {
    fn input_path(&self) -> &Path {
        &self.input_path
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn worker_count(&self) -> usize {
        self.processes
    }

    fn limit(&self) -> i64 {
        self.limit
    }

    fn mode(&self) -> ScanMode {
        self.mode
    }

    fn output_format(&self) -> OutputFormat {
        self.format
    }

    fn adapter(&self) -> AdapterKind {
        self.adapter
    }

    fn wall_clock_budget(&self) -> Option<Duration> {
        self.budget_secs.map(Duration::from_secs)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_path("input_path", &self.input_path)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_positive_number("processes", self.processes, 1)?;
        validate_limit(self.limit)?;

        if matches!(
            self.mode,
            ScanMode::Dependants | ScanMode::TransitiveDependants
        ) && self.format == OutputFormat::Markdown
        {
            return Err(TallyError::InvalidConfigValueError {
                field: "format".to_string(),
                value: "markdown".to_string(),
                reason: "the markdown table applies to the count modes only".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(feature = "cli")]
pub use cli::CliArgs;

#[cfg(feature = "cli")]
mod cli {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "deptally")]
    #[command(about = "Rank registry packages by how many other packages depend on them")]
    pub struct CliArgs {
        /// Registry dump to scan (NDJSON or a single JSON array).
        #[arg(long, short = 'i')]
        pub input_path: Option<PathBuf>,

        /// Directory the report is written into.
        #[arg(long, short = 'o')]
        pub output_dir: Option<PathBuf>,

        /// Scan worker count.
        #[arg(long, short = 'p')]
        pub processes: Option<usize>,

        /// Entries to keep in the ranking; -1 keeps all of them.
        #[arg(long, short = 'l', allow_negative_numbers = true)]
        pub limit: Option<i64>,

        #[arg(long, value_enum)]
        pub mode: Option<ScanMode>,

        #[arg(long, value_enum)]
        pub format: Option<OutputFormat>,

        #[arg(long, value_enum)]
        pub adapter: Option<AdapterKind>,

        /// Abort the scan if it runs longer than this many seconds.
        #[arg(long)]
        pub budget_secs: Option<u64>,

        /// TOML config file; command-line flags take precedence.
        #[arg(long, short = 'c')]
        pub config: Option<PathBuf>,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit JSON-formatted logs")]
        pub log_json: bool,

        #[arg(long, help = "Log memory usage per phase")]
        pub monitor: bool,
    }

    impl CliArgs {
        pub fn into_settings(self) -> Result<Settings> {
            let file = match &self.config {
                Some(path) => FileConfig::load(path)?,
                None => FileConfig::default(),
            };

            let input_path = self.input_path.or(file.input_path).ok_or_else(|| {
                TallyError::MissingConfigError {
                    field: "input_path".to_string(),
                }
            })?;

            Ok(Settings {
                input_path,
                output_dir: self
                    .output_dir
                    .or(file.output_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                processes: self.processes.or(file.processes).unwrap_or(DEFAULT_PROCESSES),
                limit: self.limit.or(file.limit).unwrap_or(DEFAULT_LIMIT),
                mode: self.mode.or(file.mode).unwrap_or(ScanMode::Counts),
                format: self.format.or(file.format).unwrap_or(OutputFormat::Json),
                adapter: self.adapter.or(file.adapter).unwrap_or(AdapterKind::Flat),
                budget_secs: self.budget_secs.or(file.budget_secs),
                verbose: self.verbose,
                monitor: self.monitor,
            })
        }
    }
}
