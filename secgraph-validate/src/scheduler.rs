//! The validation scheduler: chunked, parallel, timeout-bounded.
//!
//! One reader thread streams subject-aligned partitions into a bounded
//! channel; `workers` threads share the receiver behind a mutex (natural
//! load balancing — faster workers take more chunks) and run the conformance
//! engine on each chunk under a per-call timeout. Chunk verdicts are
//! collected in completion order, then re-sorted by chunk id so the unit
//! report is reproducible.
//!
//! A timed-out check is recorded as a `validation timeout` violation for
//! that chunk — the unit becomes non-conforming but sibling chunks keep
//! validating, and the scheduler never waits past the bound.

use crate::error::{Result, ValidateError};
use secgraph_shacl::{ConformanceVerdict, ShapeEngine};
use secgraph_turtle::{ChunkedTripleReader, ParseMode, ReaderConfig, TurtleError};
use secgraph_ir::EntityPartition;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct ValidateConfig {
    /// Worker pool size.
    pub workers: usize,
    /// Target partition size in subjects.
    pub chunk_subjects: usize,
    /// Per-chunk validation timeout.
    pub per_chunk_timeout: Duration,
    /// Parsing fidelity for the reader.
    pub mode: ParseMode,
    /// Strict-mode parse error tolerance.
    pub max_parse_errors: usize,
    /// Reader heartbeat interval.
    pub heartbeat: Option<Duration>,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        ValidateConfig {
            workers: 4,
            chunk_subjects: 500,
            per_chunk_timeout: Duration::from_secs(300),
            mode: ParseMode::Strict,
            max_parse_errors: 0,
            heartbeat: None,
        }
    }
}

/// Aggregated verdict for one unit.
#[derive(Debug, Clone)]
pub struct UnitVerdict {
    /// Logical AND over all chunk verdicts.
    pub conforms: bool,
    /// Per-chunk verdicts sorted by chunk id.
    pub chunk_verdicts: Vec<ConformanceVerdict>,
    /// Subjects read.
    pub subjects: u64,
    /// Triples read.
    pub triples: u64,
    /// Malformed statements tolerated (strict) or skipped (fast).
    pub parse_errors: u64,
    /// Wall-clock seconds for the whole unit.
    pub elapsed_secs: f64,
}

impl UnitVerdict {
    /// Total violations across all chunks.
    pub fn violation_count(&self) -> usize {
        self.chunk_verdicts.iter().map(|v| v.violations.len()).sum()
    }
}

/// Validate one unit (a data file) against a compiled engine.
///
/// Fails fast only on configuration errors (missing/unreadable data file,
/// fatally malformed input past tolerance). Individual chunk failures never
/// abort sibling chunks.
pub fn validate_unit(
    data: &Path,
    engine: &Arc<ShapeEngine>,
    config: &ValidateConfig,
) -> Result<UnitVerdict> {
    let start = Instant::now();

    // Open up front so a missing file is a synchronous configuration error.
    let reader_config = ReaderConfig {
        chunk_subjects: config.chunk_subjects,
        mode: config.mode,
        max_parse_errors: config.max_parse_errors,
        heartbeat: config.heartbeat,
    };
    let reader = ChunkedTripleReader::open(data, &reader_config)?;

    let workers = config.workers.max(1);
    // Bounded: at most ~2 chunks in flight per worker.
    let (chunk_tx, chunk_rx) = mpsc::sync_channel::<EntityPartition>(workers * 2);
    let chunk_rx = Arc::new(Mutex::new(chunk_rx));
    let (verdict_tx, verdict_rx) = mpsc::channel::<ConformanceVerdict>();

    // Reader thread: stream partitions into the bounded channel.
    let reader_handle = std::thread::Builder::new()
        .name("validate-reader".into())
        .spawn(move || -> std::result::Result<(u64, u64, u64), TurtleError> {
            let mut reader = reader;
            for partition in &mut reader {
                let partition = partition?;
                if chunk_tx.send(partition).is_err() {
                    // All workers gone; nothing left to feed.
                    break;
                }
            }
            let skipped = reader.parse_errors() as u64 + reader.skipped_lines();
            Ok((reader.subjects_read(), reader.triples_read(), skipped))
        })
        .map_err(|e| ValidateError::WorkerPanic(format!("spawn failed: {e}")))?;

    // Worker pool.
    let mut worker_handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let rx = Arc::clone(&chunk_rx);
        let tx = verdict_tx.clone();
        let engine = Arc::clone(engine);
        let timeout = config.per_chunk_timeout;
        let handle = std::thread::Builder::new()
            .name(format!("validate-{worker_id}"))
            .spawn(move || loop {
                let partition = {
                    let guard = rx.lock().expect("chunk receiver poisoned");
                    guard.recv()
                };
                let Ok(partition) = partition else {
                    return; // channel closed, reader finished
                };
                let verdict = check_with_timeout(&engine, partition, timeout);
                if tx.send(verdict).is_err() {
                    return;
                }
            })
            .map_err(|e| ValidateError::WorkerPanic(format!("spawn failed: {e}")))?;
        worker_handles.push(handle);
    }
    drop(verdict_tx);

    // Collect verdicts in completion order.
    let mut chunk_verdicts: Vec<ConformanceVerdict> = verdict_rx.iter().collect();

    for handle in worker_handles {
        handle
            .join()
            .map_err(|_| ValidateError::WorkerPanic("worker thread panicked".into()))?;
    }
    let (subjects, triples, parse_errors) = reader_handle
        .join()
        .map_err(|_| ValidateError::WorkerPanic("reader thread panicked".into()))??;

    // Stable report ordering regardless of completion order.
    chunk_verdicts.sort_by_key(|v| v.chunk_id);

    let conforms = chunk_verdicts.iter().all(|v| v.conforms);
    let verdict = UnitVerdict {
        conforms,
        chunk_verdicts,
        subjects,
        triples,
        parse_errors,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    tracing::info!(
        data = %data.display(),
        conforms,
        chunks = verdict.chunk_verdicts.len(),
        subjects,
        triples,
        violations = verdict.violation_count(),
        elapsed_secs = verdict.elapsed_secs,
        "unit validated"
    );
    Ok(verdict)
}

/// Run one conformance check bounded by `timeout`.
///
/// The check runs on its own detached thread; on expiry the worker records a
/// timeout verdict and moves on. The orphaned check finishes (or not) on its
/// own — its result send fails silently into a dropped receiver.
fn check_with_timeout(
    engine: &Arc<ShapeEngine>,
    partition: EntityPartition,
    timeout: Duration,
) -> ConformanceVerdict {
    let chunk_id = partition.id;
    let (tx, rx) = mpsc::channel();
    let engine = Arc::clone(engine);
    let spawned = std::thread::Builder::new()
        .name(format!("check-{chunk_id}"))
        .spawn(move || {
            let verdict = engine.check(&partition);
            let _ = tx.send(verdict);
        });

    if spawned.is_err() {
        return ConformanceVerdict {
            conforms: false,
            chunk_id,
            violations: vec![secgraph_shacl::Violation::worker_failure(
                chunk_id,
                "could not spawn checker thread",
            )],
            elapsed_secs: 0.0,
        };
    }

    match rx.recv_timeout(timeout) {
        Ok(verdict) => {
            tracing::debug!(
                chunk = chunk_id,
                conforms = verdict.conforms,
                violations = verdict.violations.len(),
                elapsed_secs = verdict.elapsed_secs,
                "chunk checked"
            );
            verdict
        }
        Err(_) => {
            tracing::warn!(
                chunk = chunk_id,
                timeout_secs = timeout.as_secs_f64(),
                "chunk validation timed out; recording violation"
            );
            ConformanceVerdict::timed_out(chunk_id, timeout.as_secs_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secgraph_shacl::ShapeContract;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONTRACT: &str = r#"{
        "shapes": [
            {
                "kind": "http://secgraph.org/vuln/cve#Vulnerability",
                "properties": [
                    { "path": "http://secgraph.org/vuln/cve#id", "min_count": 1 }
                ]
            }
        ]
    }"#;

    fn engine() -> Arc<ShapeEngine> {
        Arc::new(ShapeEngine::new(
            ShapeContract::from_json("test", CONTRACT).unwrap(),
        ))
    }

    fn write_temp(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn fixture(n_good: usize, n_bad: usize) -> String {
        let mut out = String::from("@prefix cve: <http://secgraph.org/vuln/cve#> .\n");
        for i in 0..n_good {
            out.push_str(&format!("cve:G{i} a cve:Vulnerability .\n"));
            out.push_str(&format!("cve:G{i} cve:id \"CVE-2024-{i:04}\" .\n"));
        }
        for i in 0..n_bad {
            // Missing the required cve:id attribute.
            out.push_str(&format!("cve:B{i} a cve:Vulnerability .\n"));
        }
        out
    }

    #[test]
    fn test_conforming_unit() {
        let f = write_temp(&fixture(10, 0));
        let config = ValidateConfig {
            chunk_subjects: 3,
            ..ValidateConfig::default()
        };
        let verdict = validate_unit(f.path(), &engine(), &config).unwrap();
        assert!(verdict.conforms);
        assert_eq!(verdict.subjects, 10);
        assert_eq!(verdict.triples, 20);
        assert_eq!(verdict.chunk_verdicts.len(), 4); // 3+3+3+1 subjects
    }

    #[test]
    fn test_single_bad_chunk_fails_unit_but_not_siblings() {
        let f = write_temp(&fixture(6, 1));
        let config = ValidateConfig {
            chunk_subjects: 2,
            ..ValidateConfig::default()
        };
        let verdict = validate_unit(f.path(), &engine(), &config).unwrap();
        assert!(!verdict.conforms);
        // All chunks still have verdicts; exactly one is non-conforming.
        let bad: Vec<_> = verdict
            .chunk_verdicts
            .iter()
            .filter(|v| !v.conforms)
            .collect();
        assert_eq!(bad.len(), 1);
        assert_eq!(verdict.violation_count(), 1);
    }

    #[test]
    fn test_verdicts_sorted_by_chunk_id() {
        let f = write_temp(&fixture(20, 0));
        let config = ValidateConfig {
            chunk_subjects: 2,
            workers: 8,
            ..ValidateConfig::default()
        };
        let verdict = validate_unit(f.path(), &engine(), &config).unwrap();
        let ids: Vec<_> = verdict.chunk_verdicts.iter().map(|v| v.chunk_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let f = write_temp(&fixture(5, 3));
        let config = ValidateConfig {
            chunk_subjects: 2,
            workers: 4,
            ..ValidateConfig::default()
        };
        let e = engine();
        let first = validate_unit(f.path(), &e, &config).unwrap();
        let second = validate_unit(f.path(), &e, &config).unwrap();
        assert_eq!(first.conforms, second.conforms);
        let flatten = |v: &UnitVerdict| -> Vec<(usize, Vec<secgraph_shacl::Violation>)> {
            v.chunk_verdicts
                .iter()
                .map(|c| (c.chunk_id, c.violations.clone()))
                .collect()
        };
        assert_eq!(flatten(&first), flatten(&second));
    }

    #[test]
    fn test_missing_data_file_fails_fast() {
        let result = validate_unit(
            Path::new("/nonexistent/unit.ttl"),
            &engine(),
            &ValidateConfig::default(),
        );
        assert!(matches!(result, Err(ValidateError::Read(_))));
    }

    #[test]
    fn test_timeout_recorded_as_violation() {
        // A zero timeout forces every chunk to time out: the scheduler must
        // return promptly with timeout violations rather than hang. Chunks
        // are large enough that a check cannot finish inside the race window
        // between spawn and the worker's recv_timeout.
        let f = write_temp(&fixture(2000, 0));
        let config = ValidateConfig {
            chunk_subjects: 1000,
            per_chunk_timeout: Duration::ZERO,
            ..ValidateConfig::default()
        };
        let started = Instant::now();
        let verdict = validate_unit(f.path(), &engine(), &config).unwrap();
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(!verdict.conforms);
        assert!(verdict
            .chunk_verdicts
            .iter()
            .all(|v| v.violations.iter().any(|x| x.constraint == "timeout")));
    }
}
