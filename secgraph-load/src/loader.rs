//! The two-phase bulk loader.
//!
//! A unit loads in two strictly ordered passes over the same source: every
//! node-defining triple commits before any relationship triple, so a
//! relationship can never reference a node the store has not seen. The
//! loader enforces this by running the passes as sequential stages of one
//! run and refusing to start RELATIONSHIPS when NODES did not complete in
//! full.
//!
//! Within a pass, triples accumulate into pass-homogeneous batches flushed
//! to the sink in reader order. The loader is single-threaded per pass; the
//! caller serializes loader invocations against the same version scope.

use crate::classify::{classify, Pass};
use crate::error::{LoadError, Result};
use crate::progress::ProgressPrinter;
use crate::sink::{DbVersion, GraphStoreSink, LoadBatch};
use secgraph_turtle::{ChunkedTripleReader, ReaderConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Nominal wall-clock cost of one batch write, for dry-run estimates.
///
/// A documented default, not a promise — real sinks vary by orders of
/// magnitude.
const BATCH_WRITE_COST_SECS: f64 = 0.002;

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Batch size for the NODES pass (and default for RELATIONSHIPS).
    pub batch_size: usize,
    /// Relationship batch size override (relationship writes are often
    /// heavier per row at the sink).
    pub rel_batch_size: Option<usize>,
    /// Version tag stamped on all writes of this run.
    pub db_version: DbVersion,
    /// Clear prior data under the version scope before the NODES pass.
    /// Irreversible; never implied.
    pub reset: bool,
    /// One progress line per update instead of a single growing line.
    pub progress_newline: bool,
    /// Emit a progress update every N committed batches.
    pub heartbeat_batches: u64,
    /// Expected triple count for the pass being loaded (typically from a
    /// prior dry run); enables "remaining" figures in heartbeats.
    pub expected_triples: Option<u64>,
    /// Reader settings (chunk size, parse mode, tolerance).
    pub reader: ReaderConfig,
}

impl LoadConfig {
    /// Defaults for a version tag.
    pub fn new(db_version: DbVersion) -> Self {
        LoadConfig {
            batch_size: 1000,
            rel_batch_size: None,
            db_version,
            reset: false,
            progress_newline: false,
            heartbeat_batches: 25,
            expected_triples: None,
            reader: ReaderConfig::default(),
        }
    }

    fn batch_size_for(&self, pass: Pass) -> usize {
        match pass {
            Pass::Nodes => self.batch_size,
            Pass::Relationships => self.rel_batch_size.unwrap_or(self.batch_size),
        }
    }
}

/// Summary of one completed pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    /// Which pass
    pub pass: Pass,
    /// Triples written
    pub triples: u64,
    /// Batches flushed
    pub batches: u64,
    /// Wall-clock seconds
    pub elapsed_secs: f64,
}

/// Summary of a full two-pass load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Version scope written
    pub db_version: String,
    /// NODES pass summary
    pub nodes: PassSummary,
    /// RELATIONSHIPS pass summary
    pub relationships: PassSummary,
}

/// Estimates from a dry run: classification and counting only, the sink is
/// never contacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunReport {
    /// Node-pass triples
    pub nodes_triples: u64,
    /// Relationship-pass triples
    pub rel_triples: u64,
    /// Node-pass batches at the configured batch size
    pub nodes_batches: u64,
    /// Relationship-pass batches at the configured batch size
    pub rel_batches: u64,
    /// Measured streaming/classification seconds
    pub scan_secs: f64,
    /// Estimated wall-clock for a real run (scan + nominal write cost)
    pub estimated_secs: f64,
}

/// Run one pass of the loader over a unit.
///
/// Streams the unit, keeps only this pass's triples, and flushes batches in
/// reader order. A sink failure aborts the pass immediately.
pub fn load_pass(
    data: &Path,
    pass: Pass,
    sink: &mut dyn GraphStoreSink,
    config: &LoadConfig,
) -> Result<PassSummary> {
    let start = Instant::now();
    let batch_size = config.batch_size_for(pass);

    if pass == Pass::Nodes && config.reset {
        tracing::warn!(version = %config.db_version, "resetting store scope before NODES pass");
        sink.reset_scope(&config.db_version).map_err(|source| LoadError::Sink {
            pass,
            batch: 0,
            source,
        })?;
    }

    let reader = ChunkedTripleReader::open(data, &config.reader)?;
    let mut progress = ProgressPrinter::new(config.progress_newline);

    let mut pending: Vec<secgraph_ir::Triple> = Vec::with_capacity(batch_size);
    let mut batches: u64 = 0;
    let mut triples: u64 = 0;

    let mut flush = |pending: &mut Vec<secgraph_ir::Triple>,
                     batches: &mut u64,
                     triples: &mut u64,
                     sink: &mut dyn GraphStoreSink,
                     progress: &mut ProgressPrinter|
     -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let batch = LoadBatch {
            pass,
            index: *batches,
            triples: std::mem::take(pending),
        };
        let written = sink
            .write_batch(&batch, &config.db_version)
            .map_err(|source| LoadError::Sink {
                pass,
                batch: batch.index,
                source,
            })?;
        *batches += 1;
        *triples += written as u64;

        if *batches % config.heartbeat_batches == 0 {
            let remaining = config
                .expected_triples
                .map(|total| format!(", ~{} remaining", total.saturating_sub(*triples)))
                .unwrap_or_default();
            progress.update(&format!(
                "[{pass}] {batches} batches, {triples} triples{remaining}"
            ));
            tracing::debug!(pass = %pass, batches = *batches, triples = *triples, "pass heartbeat");
        }
        Ok(())
    };

    for partition in reader {
        let partition = partition?;
        for triple in partition.triples {
            if classify(&triple) != pass {
                continue;
            }
            pending.push(triple);
            if pending.len() >= batch_size {
                flush(&mut pending, &mut batches, &mut triples, sink, &mut progress)?;
            }
        }
    }
    // Final partial batch.
    flush(&mut pending, &mut batches, &mut triples, sink, &mut progress)?;
    progress.finish();

    let summary = PassSummary {
        pass,
        triples,
        batches,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    tracing::info!(
        pass = %pass,
        triples,
        batches,
        version = %config.db_version,
        elapsed_secs = summary.elapsed_secs,
        "pass complete"
    );
    Ok(summary)
}

/// Run both passes in order: NODES, then RELATIONSHIPS.
///
/// The ordering invariant lives here: if the NODES pass fails — any sink
/// write error, any fatal read error — the error propagates and the
/// RELATIONSHIPS pass never issues a single write for this version.
pub fn load_unit(
    data: &Path,
    sink: &mut dyn GraphStoreSink,
    config: &LoadConfig,
) -> Result<LoadSummary> {
    let nodes = load_pass(data, Pass::Nodes, sink, config)?;
    let relationships = load_pass(data, Pass::Relationships, sink, config)?;
    Ok(LoadSummary {
        db_version: config.db_version.as_str().to_string(),
        nodes,
        relationships,
    })
}

/// Classify and count without contacting the sink.
///
/// The report's batch and triple counts match what a real run with the same
/// input and batch sizes would produce.
pub fn dry_run(data: &Path, config: &LoadConfig) -> Result<DryRunReport> {
    let start = Instant::now();
    let reader = ChunkedTripleReader::open(data, &config.reader)?;

    let mut nodes_triples: u64 = 0;
    let mut rel_triples: u64 = 0;
    for partition in reader {
        let partition = partition?;
        for triple in &partition.triples {
            match classify(triple) {
                Pass::Nodes => nodes_triples += 1,
                Pass::Relationships => rel_triples += 1,
            }
        }
    }

    let scan_secs = start.elapsed().as_secs_f64();
    let nodes_batches = nodes_triples.div_ceil(config.batch_size_for(Pass::Nodes) as u64);
    let rel_batches = rel_triples.div_ceil(config.batch_size_for(Pass::Relationships) as u64);
    // Real runs stream the file once per pass.
    let estimated_secs =
        scan_secs * 2.0 + (nodes_batches + rel_batches) as f64 * BATCH_WRITE_COST_SECS;

    let report = DryRunReport {
        nodes_triples,
        rel_triples,
        nodes_batches,
        rel_batches,
        scan_secs,
        estimated_secs,
    };
    tracing::info!(
        nodes_triples,
        rel_triples,
        nodes_batches,
        rel_batches,
        estimated_secs,
        "dry run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// 5 subjects, each with a type + name (10 NODES triples) and one
    /// entity reference (5 RELATIONSHIPS triples).
    const FIXTURE: &str = "\
@prefix ex: <http://example.org/> .
ex:s1 a ex:Technique .
ex:s1 ex:name \"one\" .
ex:s1 ex:refines ex:s2 .
ex:s2 a ex:Technique .
ex:s2 ex:name \"two\" .
ex:s2 ex:refines ex:s3 .
ex:s3 a ex:Technique .
ex:s3 ex:name \"three\" .
ex:s3 ex:refines ex:s4 .
ex:s4 a ex:Technique .
ex:s4 ex:name \"four\" .
ex:s4 ex:refines ex:s5 .
ex:s5 a ex:Technique .
ex:s5 ex:name \"five\" .
ex:s5 ex:refines ex:s1 .
";

    fn write_temp(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn config(batch_size: usize) -> LoadConfig {
        LoadConfig {
            batch_size,
            ..LoadConfig::new(DbVersion::new("test"))
        }
    }

    #[test]
    fn test_batch_shapes_and_pass_order() {
        // 10 node triples and 5 relationship triples at batch size 4:
        // NODES flushes (4, 4, 2), then RELATIONSHIPS flushes (4, 1).
        let f = write_temp(FIXTURE);
        let mut sink = MemorySink::new();
        let summary = load_unit(f.path(), &mut sink, &config(4)).unwrap();

        assert_eq!(summary.nodes.triples, 10);
        assert_eq!(summary.nodes.batches, 3);
        assert_eq!(summary.relationships.triples, 5);
        assert_eq!(summary.relationships.batches, 2);

        let shape: Vec<(Pass, usize)> =
            sink.writes.iter().map(|w| (w.pass, w.len)).collect();
        assert_eq!(
            shape,
            vec![
                (Pass::Nodes, 4),
                (Pass::Nodes, 4),
                (Pass::Nodes, 2),
                (Pass::Relationships, 4),
                (Pass::Relationships, 1),
            ]
        );
    }

    #[test]
    fn test_no_relationship_write_before_nodes_success() {
        let f = write_temp(FIXTURE);
        let mut sink = MemorySink::new();
        load_unit(f.path(), &mut sink, &config(4)).unwrap();

        // Every NODES write precedes every RELATIONSHIPS write.
        let first_rel = sink
            .writes
            .iter()
            .position(|w| w.pass == Pass::Relationships)
            .unwrap();
        assert!(sink.writes[..first_rel]
            .iter()
            .all(|w| w.pass == Pass::Nodes));
        assert_eq!(sink.writes[..first_rel].len(), 3);
    }

    #[test]
    fn test_nodes_failure_suppresses_relationships() {
        // Forced sink error on NODES batch 1 (the second of three): the run
        // fails and the RELATIONSHIPS pass issues zero writes.
        let f = write_temp(FIXTURE);
        let mut sink = MemorySink::failing_at(Pass::Nodes, 1);
        let err = load_unit(f.path(), &mut sink, &config(4)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Sink {
                pass: Pass::Nodes,
                batch: 1,
                ..
            }
        ));
        assert_eq!(sink.writes_for(Pass::Relationships), 0);
        assert_eq!(sink.writes_for(Pass::Nodes), 1);
    }

    #[test]
    fn test_dry_run_matches_real_counts_without_sink() {
        let f = write_temp(FIXTURE);
        let report = dry_run(f.path(), &config(4)).unwrap();
        assert_eq!(report.nodes_triples, 10);
        assert_eq!(report.rel_triples, 5);
        assert_eq!(report.nodes_batches, 3);
        assert_eq!(report.rel_batches, 2);
        assert!(report.estimated_secs >= report.scan_secs);

        let mut sink = MemorySink::new();
        let summary = load_unit(f.path(), &mut sink, &config(4)).unwrap();
        assert_eq!(summary.nodes.triples, report.nodes_triples);
        assert_eq!(summary.nodes.batches, report.nodes_batches);
        assert_eq!(summary.relationships.triples, report.rel_triples);
        assert_eq!(summary.relationships.batches, report.rel_batches);
    }

    #[test]
    fn test_reset_only_on_nodes_pass_when_requested() {
        let f = write_temp(FIXTURE);

        let mut sink = MemorySink::new();
        load_unit(f.path(), &mut sink, &config(4)).unwrap();
        assert!(sink.resets.is_empty());

        let mut sink = MemorySink::new();
        let cfg = LoadConfig {
            reset: true,
            ..config(4)
        };
        load_unit(f.path(), &mut sink, &cfg).unwrap();
        assert_eq!(sink.resets, vec!["test".to_string()]);
    }

    #[test]
    fn test_rel_batch_size_override() {
        let f = write_temp(FIXTURE);
        let mut sink = MemorySink::new();
        let cfg = LoadConfig {
            rel_batch_size: Some(2),
            ..config(4)
        };
        let summary = load_unit(f.path(), &mut sink, &cfg).unwrap();
        assert_eq!(summary.nodes.batches, 3);
        assert_eq!(summary.relationships.batches, 3); // 2 + 2 + 1
    }

    #[test]
    fn test_single_pass_load() {
        let f = write_temp(FIXTURE);
        let mut sink = MemorySink::new();
        let summary = load_pass(f.path(), Pass::Relationships, &mut sink, &config(4)).unwrap();
        assert_eq!(summary.triples, 5);
        assert_eq!(sink.writes_for(Pass::Nodes), 0);
    }
}
