use crate::core::reader::RecordReader;
use crate::domain::model::ScanStats;
use crate::domain::ports::{Accumulate, RecordAdapter};
use crate::utils::error::{Result, TallyError};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Records per partition handed to a worker. Contiguous and record-aligned:
/// the reader finds the boundaries, so a partition can never split a record.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Batches in flight per worker channel; bounds producer read-ahead so
/// memory stays independent of input size.
const CHANNEL_DEPTH: usize = 2;

/// Single-threaded scan. Also the reference the parallel path must agree
/// with, count for count.
pub fn scan_sequential<A: Accumulate>(
    path: &Path,
    adapter: &dyn RecordAdapter,
) -> Result<(A, ScanStats)> {
    let reader = RecordReader::open(path)?;
    let mut acc = A::default();
    let mut stats = ScanStats::default();

    for raw in reader {
        let raw = raw.map_err(|e| stream_error(path, e))?;
        consume_record(adapter, &raw, &mut acc, &mut stats);
    }

    Ok((acc, stats))
}

/// Partitioned scan: one producer finds record boundaries and deals
/// contiguous batches round-robin to a fixed pool of blocking workers; each
/// worker decodes and accumulates its own partial, and the partials are
/// merged key-wise after the join barrier. No shared mutable state anywhere:
/// partials move by value.
///
/// A fatal producer or worker error discards every partial, so the caller
/// never sees an under-counted table.
pub async fn scan_parallel<A: Accumulate>(
    path: PathBuf,
    adapter: Arc<dyn RecordAdapter>,
    workers: usize,
    batch_size: usize,
) -> Result<(A, ScanStats)> {
    let workers = workers.max(1);

    // Fail before any task spawns if the input is missing or unreadable.
    std::fs::metadata(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TallyError::InputNotFound { path: path.clone() },
        _ => TallyError::InputUnreadable {
            path: path.clone(),
            source: e,
        },
    })?;

    let mut senders: Vec<SyncSender<Vec<Vec<u8>>>> = Vec::with_capacity(workers);
    let mut handles: Vec<JoinHandle<Result<(A, ScanStats)>>> = Vec::with_capacity(workers);

    for worker in 0..workers {
        let (tx, rx) = sync_channel(CHANNEL_DEPTH);
        senders.push(tx);
        let adapter = Arc::clone(&adapter);
        handles.push(tokio::task::spawn_blocking(move || {
            worker_loop::<A>(worker, rx, adapter)
        }));
    }

    let producer: JoinHandle<Result<()>> = tokio::task::spawn_blocking(move || {
        produce_batches(&path, senders, batch_size)
    });

    let produced = match producer.await {
        Ok(result) => result,
        Err(e) => Err(TallyError::WorkerFatal {
            worker: 0,
            message: format!("record producer panicked: {e}"),
        }),
    };

    // Join barrier: collect every partial (or failure) before merging.
    let mut merged = A::default();
    let mut stats = ScanStats::default();
    let mut first_failure: Option<TallyError> = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok((partial, partial_stats))) => {
                merged.merge(partial);
                stats.merge(partial_stats);
            }
            Ok(Err(e)) => {
                first_failure.get_or_insert(e);
            }
            Err(e) => {
                first_failure.get_or_insert(TallyError::WorkerFatal {
                    worker,
                    message: format!("worker panicked: {e}"),
                });
            }
        }
    }

    // Partials are already discarded on any fatal path; `merged` is dropped.
    produced?;
    if let Some(failure) = first_failure {
        return Err(failure);
    }

    Ok((merged, stats))
}

fn produce_batches(
    path: &Path,
    senders: Vec<SyncSender<Vec<Vec<u8>>>>,
    batch_size: usize,
) -> Result<()> {
    let workers = senders.len();
    let reader = RecordReader::open(path)?;
    let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_size);
    let mut target = 0usize;

    for raw in reader {
        let raw = raw.map_err(|e| stream_error(path, e))?;
        batch.push(raw);
        if batch.len() == batch_size {
            dispatch(&senders, target, std::mem::take(&mut batch))?;
            batch.reserve(batch_size);
            target = (target + 1) % workers;
        }
    }

    if !batch.is_empty() {
        dispatch(&senders, target, batch)?;
    }

    // Dropping the senders closes every channel; workers drain and return.
    Ok(())
}

fn dispatch(
    senders: &[SyncSender<Vec<Vec<u8>>>],
    target: usize,
    batch: Vec<Vec<u8>>,
) -> Result<()> {
    senders[target].send(batch).map_err(|_| TallyError::WorkerFatal {
        worker: target,
        message: "worker exited before end of input".to_string(),
    })
}

fn worker_loop<A: Accumulate>(
    worker: usize,
    rx: Receiver<Vec<Vec<u8>>>,
    adapter: Arc<dyn RecordAdapter>,
) -> Result<(A, ScanStats)> {
    let mut acc = A::default();
    let mut stats = ScanStats::default();

    while let Ok(batch) = rx.recv() {
        for raw in &batch {
            consume_record(adapter.as_ref(), raw, &mut acc, &mut stats);
        }
    }

    tracing::debug!(
        worker,
        processed = stats.records_processed,
        skipped = stats.records_skipped,
        "worker partition complete"
    );
    Ok((acc, stats))
}

fn consume_record<A: Accumulate>(
    adapter: &dyn RecordAdapter,
    raw: &[u8],
    acc: &mut A,
    stats: &mut ScanStats,
) {
    match adapter.decode(raw) {
        Ok(record) => {
            acc.add(&record);
            stats.records_processed += 1;
        }
        Err(e) => {
            tracing::debug!("skipping undecodable record: {e}");
            stats.records_skipped += 1;
        }
    }
}

fn stream_error(path: &Path, e: TallyError) -> TallyError {
    match e {
        TallyError::IoError(source) => TallyError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}
