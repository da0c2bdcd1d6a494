//! The ingestion orchestrator: validation gates loading.
//!
//! A unit is handed to the loader only after its conformance verdict; a
//! rejected unit gets its report written and never touches the sink. For a
//! directory of units each is orchestrated independently — one unit's
//! rejection or failure never blocks the others.

use secgraph_load::{load_unit, GraphStoreSink, LoadConfig, LoadError, LoadSummary};
use secgraph_shacl::ShapeEngine;
use secgraph_validate::{
    report_path_for, validate_unit, UnitReport, ValidateConfig, ValidateError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Orchestrator errors: infrastructure, never verdicts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result of orchestrating one unit.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Unit conformed and both loader passes completed.
    Accepted(Box<LoadSummary>),
    /// Unit did not conform; report written, sink untouched.
    Rejected(Box<UnitReport>),
}

/// Orchestrator configuration for one run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Validation scheduler settings.
    pub validate: ValidateConfig,
    /// Loader settings (version tag, batch sizes, reset).
    pub load: LoadConfig,
    /// Directory for per-unit validation reports.
    pub reports_dir: PathBuf,
}

/// Validate one unit and, on conformance, load it in both passes.
pub fn ingest_unit(
    name: &str,
    data: &Path,
    engine: &Arc<ShapeEngine>,
    sink: &mut dyn GraphStoreSink,
    config: &IngestConfig,
) -> Result<IngestOutcome, PipelineError> {
    let started_at = chrono::Utc::now();
    let verdict = validate_unit(data, engine, &config.validate)?;
    let report = UnitReport::from_verdict(
        name,
        data,
        &engine.contract().name,
        started_at,
        &verdict,
    );
    report.write(&report_path_for(&config.reports_dir, name))?;

    if !verdict.conforms {
        tracing::warn!(
            unit = name,
            violations = verdict.violation_count(),
            "unit rejected; skipping load"
        );
        return Ok(IngestOutcome::Rejected(Box::new(report)));
    }

    let summary = load_unit(data, sink, &config.load)?;
    tracing::info!(
        unit = name,
        nodes = summary.nodes.triples,
        relationships = summary.relationships.triples,
        version = %config.load.db_version,
        "unit accepted and loaded"
    );
    Ok(IngestOutcome::Accepted(Box::new(summary)))
}

/// Aggregate counts for a directory run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestTotals {
    /// Units that conformed and loaded.
    pub accepted: usize,
    /// Units rejected by the conformance gate.
    pub rejected: usize,
    /// Units that hit infrastructure errors (read, sink).
    pub failed: usize,
}

impl IngestTotals {
    /// True when the run should exit non-zero.
    pub fn has_problems(&self) -> bool {
        self.rejected > 0 || self.failed > 0
    }
}

/// Orchestrate every `.ttl` unit in a directory, independently.
///
/// Units are processed in filename order. The NODES-before-RELATIONSHIPS
/// invariant holds per unit; a rejected or failed unit is logged and
/// skipped without aborting the batch.
pub fn ingest_dir(
    dir: &Path,
    engine: &Arc<ShapeEngine>,
    sink: &mut dyn GraphStoreSink,
    config: &IngestConfig,
) -> Result<IngestTotals, std::io::Error> {
    let mut units: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "ttl"))
        .collect();
    units.sort();

    let mut totals = IngestTotals::default();
    for unit in &units {
        let name = unit
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unit".to_string());
        match ingest_unit(&name, unit, engine, sink, config) {
            Ok(IngestOutcome::Accepted(_)) => totals.accepted += 1,
            Ok(IngestOutcome::Rejected(_)) => totals.rejected += 1,
            Err(e) => {
                tracing::error!(unit = %name, error = %e, "unit failed");
                totals.failed += 1;
            }
        }
    }

    tracing::info!(
        units = units.len(),
        accepted = totals.accepted,
        rejected = totals.rejected,
        failed = totals.failed,
        "directory ingest complete"
    );
    Ok(totals)
}
