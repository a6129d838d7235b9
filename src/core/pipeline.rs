use crate::core::adapter::build_adapter;
use crate::core::rank::rank_and_truncate;
use crate::core::report::{dependants_to_json, ranked_to_json, ranked_to_markdown};
use crate::core::scan::{scan_parallel, scan_sequential, DEFAULT_BATCH_SIZE};
use crate::core::transitive::{transitive_counts, transitive_dependants};
use crate::domain::model::{
    DependantMap, OutputFormat, Report, ScanMode, ScanOutcome, ScanProduct, ScanStats, TallyTable,
};
use crate::domain::ports::{Accumulate, ConfigProvider, Pipeline, RecordAdapter, Storage};
use crate::utils::error::{Result, TallyError};
use crate::utils::validation::validate_limit;
use async_trait::async_trait;
use std::sync::Arc;

/// The one pipeline this tool runs: stream the dump, build the configured
/// aggregate, rank, and hand the serialized report to storage.
pub struct TallyPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    adapter: Arc<dyn RecordAdapter>,
}

impl<S: Storage, C: ConfigProvider> TallyPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        let adapter = build_adapter(config.adapter());
        Self {
            storage,
            config,
            adapter,
        }
    }

    async fn scan_as<A: Accumulate>(&self) -> Result<(A, ScanStats)> {
        let path = self.config.input_path().to_path_buf();
        let adapter = Arc::clone(&self.adapter);
        let workers = self.config.worker_count();

        if workers <= 1 {
            tokio::task::spawn_blocking(move || scan_sequential::<A>(&path, adapter.as_ref()))
                .await
                .map_err(|e| TallyError::WorkerFatal {
                    worker: 0,
                    message: format!("scan task panicked: {e}"),
                })?
        } else {
            scan_parallel::<A>(path, adapter, workers, DEFAULT_BATCH_SIZE).await
        }
    }

    async fn run_scan(&self) -> Result<ScanOutcome> {
        match self.config.mode() {
            ScanMode::Counts => {
                let (table, stats) = self.scan_as::<TallyTable>().await?;
                Ok(ScanOutcome {
                    product: ScanProduct::Counts(table),
                    stats,
                })
            }
            // The transitive modes scan exactly like dependants mode; the
            // closure is taken in the rank step.
            ScanMode::Dependants | ScanMode::TransitiveDependants | ScanMode::TransitiveCounts => {
                let (map, stats) = self.scan_as::<DependantMap>().await?;
                Ok(ScanOutcome {
                    product: ScanProduct::Dependants(map),
                    stats,
                })
            }
        }
    }
}

#[async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for TallyPipeline<S, C> {
    async fn scan(&self) -> Result<ScanOutcome> {
        // An unusable limit must surface before any scan work starts.
        validate_limit(self.config.limit())?;

        match self.config.wall_clock_budget() {
            Some(budget) => tokio::time::timeout(budget, self.run_scan())
                .await
                .map_err(|_| TallyError::DeadlineExceeded {
                    budget_secs: budget.as_secs(),
                })?,
            None => self.run_scan().await,
        }
    }

    fn rank(&self, product: ScanProduct) -> Result<Report> {
        match product {
            ScanProduct::Counts(table) => Ok(Report::Ranked(rank_and_truncate(
                table,
                self.config.limit(),
            )?)),
            ScanProduct::Dependants(map) => match self.config.mode() {
                ScanMode::TransitiveDependants => {
                    Ok(Report::Dependants(transitive_dependants(&map)))
                }
                ScanMode::TransitiveCounts => Ok(Report::Ranked(rank_and_truncate(
                    transitive_counts(&map),
                    self.config.limit(),
                )?)),
                // The inverse map is a complete artifact; the limit only
                // shapes the count rankings.
                _ => Ok(Report::Dependants(map)),
            },
        }
    }

    async fn publish(&self, report: Report) -> Result<String> {
        let (file_name, payload) = match (&report, self.config.output_format()) {
            (Report::Ranked(entries), OutputFormat::Json) => {
                ("ranked.json", ranked_to_json(entries)?)
            }
            (Report::Ranked(entries), OutputFormat::Markdown) => {
                ("ranked.md", ranked_to_markdown(entries))
            }
            (Report::Dependants(map), _) => {
                let file_name = if self.config.mode() == ScanMode::TransitiveDependants {
                    "transitive-dependants.json"
                } else {
                    "dependants.json"
                };
                (file_name, dependants_to_json(map)?)
            }
        };

        self.storage
            .write_file(file_name, payload.as_bytes())
            .await?;

        Ok(self
            .config
            .output_dir()
            .join(file_name)
            .display()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::AdapterKind;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[derive(Default)]
    struct MockStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MockStorage {
        fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(path).cloned()
        }

        fn is_empty(&self) -> bool {
            self.files.lock().unwrap().is_empty()
        }
    }

    impl Storage for &MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.get_file(path).ok_or_else(|| {
                TallyError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_path: PathBuf,
        output_dir: PathBuf,
        processes: usize,
        limit: i64,
        mode: ScanMode,
        format: OutputFormat,
        budget: Option<Duration>,
    }

    impl MockConfig {
        fn new(input_path: PathBuf) -> Self {
            Self {
                input_path,
                output_dir: PathBuf::from("test-output"),
                processes: 2,
                limit: -1,
                mode: ScanMode::Counts,
                format: OutputFormat::Json,
                budget: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
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
            AdapterKind::Flat
        }

        fn wall_clock_budget(&self) -> Option<Duration> {
            self.budget
        }
    }

    fn fixture() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name":"x","dependencies":["a","b"]}}"#).unwrap();
        writeln!(file, r#"{{"name":"y","dependencies":["b"]}}"#).unwrap();
        writeln!(file, r#"{{"name":"z","dependencies":[]}}"#).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn counts_pipeline_writes_ranked_json() {
        let file = fixture();
        let storage = MockStorage::default();
        let config = MockConfig::new(file.path().to_path_buf());
        let pipeline = TallyPipeline::new(&storage, config);

        let outcome = pipeline.scan().await.unwrap();
        assert_eq!(outcome.stats.records_processed, 3);
        let report = pipeline.rank(outcome.product).unwrap();
        let path = pipeline.publish(report).await.unwrap();

        assert!(path.ends_with("ranked.json"));
        let written = storage.get_file("ranked.json").unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["name"], "b");
        assert_eq!(parsed[0]["count"], 2);
    }

    #[tokio::test]
    async fn limit_one_keeps_only_the_top_entry() {
        let file = fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.limit = 1;
        let pipeline = TallyPipeline::new(&storage, config);

        let outcome = pipeline.scan().await.unwrap();
        let report = pipeline.rank(outcome.product).unwrap();
        match report {
            Report::Ranked(ref entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].name, "b");
            }
            _ => panic!("expected ranked report"),
        }
    }

    #[tokio::test]
    async fn invalid_limit_fails_before_touching_the_input() {
        // Input path does not exist; the limit check must win.
        let storage = MockStorage::default();
        let mut config = MockConfig::new(PathBuf::from("/no/such/file.json"));
        config.limit = -5;
        let pipeline = TallyPipeline::new(&storage, config);

        let err = pipeline.scan().await.unwrap_err();
        assert!(matches!(err, TallyError::InvalidLimit { value: -5, .. }));
    }

    #[tokio::test]
    async fn markdown_format_writes_table() {
        let file = fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.format = OutputFormat::Markdown;
        let pipeline = TallyPipeline::new(&storage, config);

        let outcome = pipeline.scan().await.unwrap();
        let report = pipeline.rank(outcome.product).unwrap();
        let path = pipeline.publish(report).await.unwrap();

        assert!(path.ends_with("ranked.md"));
        let written = String::from_utf8(storage.get_file("ranked.md").unwrap()).unwrap();
        assert!(written.starts_with("| # | name | count |"));
        assert!(written.contains("| 1 | b | 2 |"));
    }

    #[tokio::test]
    async fn dependants_mode_writes_inverse_map() {
        let file = fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.mode = ScanMode::Dependants;
        let pipeline = TallyPipeline::new(&storage, config);

        let outcome = pipeline.scan().await.unwrap();
        let report = pipeline.rank(outcome.product).unwrap();
        let path = pipeline.publish(report).await.unwrap();

        assert!(path.ends_with("dependants.json"));
        let written = storage.get_file("dependants.json").unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed["b"], serde_json::json!(["x", "y"]));
        assert_eq!(parsed["a"], serde_json::json!(["x"]));
    }

    fn chain_fixture() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name":"app","dependencies":["lib"]}}"#).unwrap();
        writeln!(file, r#"{{"name":"lib","dependencies":["core"]}}"#).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn transitive_dependants_mode_expands_chains() {
        let file = chain_fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.mode = ScanMode::TransitiveDependants;
        let pipeline = TallyPipeline::new(&storage, config);

        let outcome = pipeline.scan().await.unwrap();
        let report = pipeline.rank(outcome.product).unwrap();
        let path = pipeline.publish(report).await.unwrap();

        assert!(path.ends_with("transitive-dependants.json"));
        let written = storage.get_file("transitive-dependants.json").unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&written).unwrap();
        // app reaches core only through lib.
        assert_eq!(parsed["core"], serde_json::json!(["app", "lib"]));
        assert_eq!(parsed["lib"], serde_json::json!(["app"]));
    }

    #[tokio::test]
    async fn transitive_counts_mode_ranks_by_reach() {
        let file = chain_fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.mode = ScanMode::TransitiveCounts;
        let pipeline = TallyPipeline::new(&storage, config);

        let outcome = pipeline.scan().await.unwrap();
        let report = pipeline.rank(outcome.product).unwrap();
        pipeline.publish(report).await.unwrap();

        let written = storage.get_file("ranked.json").unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed[0]["name"], "core");
        assert_eq!(parsed[0]["count"], 2);
        assert_eq!(parsed[1]["name"], "lib");
        assert_eq!(parsed[1]["count"], 1);
    }

    #[tokio::test]
    async fn expired_budget_aborts_without_output() {
        let file = fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.budget = Some(Duration::ZERO);
        let pipeline = TallyPipeline::new(&storage, config);

        let err = pipeline.scan().await.unwrap_err();
        assert!(matches!(err, TallyError::DeadlineExceeded { .. }));
        // Nothing reaches storage on the fatal path.
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn generous_budget_does_not_interfere() {
        let file = fixture();
        let storage = MockStorage::default();
        let mut config = MockConfig::new(file.path().to_path_buf());
        config.budget = Some(Duration::from_secs(600));
        let pipeline = TallyPipeline::new(&storage, config);

        assert!(pipeline.scan().await.is_ok());
    }
}
