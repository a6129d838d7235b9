pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::Settings;

pub use crate::core::engine::Engine;
pub use crate::core::pipeline::TallyPipeline;
pub use crate::core::storage::LocalStorage;
pub use domain::model::{RankedEntry, ScanMode, ScanStats, TallyTable};
pub use utils::error::{Result, TallyError};
