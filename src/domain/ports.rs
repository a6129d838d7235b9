use crate::domain::model::{
    AdapterKind, OutputFormat, PackageRecord, Report, ScanMode, ScanOutcome, ScanProduct,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &Path;
    fn output_dir(&self) -> &Path;
    fn worker_count(&self) -> usize;
    fn limit(&self) -> i64;
    fn mode(&self) -> ScanMode;
    fn output_format(&self) -> OutputFormat;
    fn adapter(&self) -> AdapterKind;
    fn wall_clock_budget(&self) -> Option<Duration>;
}

/// The record-shape contract with the upstream export format: where the
/// package name and the dependency names live inside one raw record.
/// Decode failures are per-record and non-fatal; the scan skips and counts.
pub trait RecordAdapter: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<PackageRecord>;
}

/// A partial aggregate built by one worker over one partition, merged
/// key-wise at the join barrier. Merging must be commutative and
/// associative so worker completion order cannot change the result.
pub trait Accumulate: Default + Send + 'static {
    fn add(&mut self, record: &PackageRecord);
    fn merge(&mut self, other: Self);
}

/// scan -> rank -> publish, mirroring the batch pipeline's three phases.
/// `rank` is pure; `publish` hands the report to the serialization side.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn scan(&self) -> Result<ScanOutcome>;
    fn rank(&self, product: ScanProduct) -> Result<Report>;
    async fn publish(&self, report: Report) -> Result<String>;
}
