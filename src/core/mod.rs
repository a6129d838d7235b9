pub mod adapter;
pub mod engine;
pub mod pipeline;
pub mod rank;
pub mod reader;
pub mod report;
pub mod scan;
pub mod storage;
pub mod transitive;

pub use crate::domain::model::{PackageRecord, RankedEntry, ScanStats, TallyTable};
pub use crate::domain::ports::{Accumulate, ConfigProvider, Pipeline, RecordAdapter, Storage};
pub use crate::utils::error::Result;
