use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives a pipeline through its three phases and reports scan bookkeeping
/// to the log. Owns the optional system monitor.
pub struct Engine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> Engine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Scanning registry dump...");
        let outcome = self.pipeline.scan().await?;
        let stats = outcome.stats;
        tracing::info!(
            processed = stats.records_processed,
            skipped = stats.records_skipped,
            "Scan complete"
        );
        if stats.records_skipped > 0 {
            tracing::warn!(
                "{} of {} records could not be decoded and were skipped",
                stats.records_skipped,
                stats.total_records()
            );
        }
        self.monitor.log_stats("scan");

        tracing::info!("Ranking...");
        let report = self.pipeline.rank(outcome.product)?;
        self.monitor.log_stats("rank");

        tracing::info!("Writing report...");
        let output_path = self.pipeline.publish(report).await?;
        tracing::info!("Report saved to: {}", output_path);
        self.monitor.log_stats("publish");
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
