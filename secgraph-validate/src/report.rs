//! Persisted validation reports.
//!
//! One structured JSON report per validation job, named deterministically
//! from the standard identity; a consolidation step merges many reports into
//! one array keyed by source filename.

use crate::error::{Result, ValidateError};
use crate::scheduler::UnitVerdict;
use secgraph_shacl::ConformanceVerdict;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The on-disk report for one validated unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    /// Standard/job name
    pub standard: String,
    /// Source data file (the consolidation key)
    pub source: String,
    /// Contract used
    pub contract: String,
    /// Unit-level conformance (AND over chunks)
    pub conforms: bool,
    /// Subjects read
    pub subjects: u64,
    /// Triples read
    pub triples: u64,
    /// Malformed statements tolerated or skipped
    pub parse_errors: u64,
    /// Per-chunk verdicts, chunk-id order
    pub chunks: Vec<ConformanceVerdict>,
    /// RFC 3339 start time
    pub started_at: String,
    /// Wall-clock seconds
    pub elapsed_secs: f64,
}

impl UnitReport {
    /// Build a report from a unit verdict.
    pub fn from_verdict(
        standard: &str,
        source: &Path,
        contract: &str,
        started_at: chrono::DateTime<chrono::Utc>,
        verdict: &UnitVerdict,
    ) -> Self {
        UnitReport {
            standard: standard.to_string(),
            source: source.display().to_string(),
            contract: contract.to_string(),
            conforms: verdict.conforms,
            subjects: verdict.subjects,
            triples: verdict.triples,
            parse_errors: verdict.parse_errors,
            chunks: verdict.chunk_verdicts.clone(),
            started_at: started_at.to_rfc3339(),
            elapsed_secs: verdict.elapsed_secs,
        }
    }

    /// Total violations across all chunks.
    pub fn violation_count(&self) -> usize {
        self.chunks.iter().map(|c| c.violations.len()).sum()
    }

    /// Write the report as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ValidateError::ReportIo {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            ValidateError::ReportJson {
                path: path.display().to_string(),
                source,
            }
        })?;
        std::fs::write(path, json).map_err(|source| ValidateError::ReportIo {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "report written");
        Ok(())
    }

    /// Read a report back.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ValidateError::ReportIo {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ValidateError::ReportJson {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Deterministic report path for a standard: `<dir>/<standard>_validation.json`.
pub fn report_path_for(dir: &Path, standard: &str) -> PathBuf {
    dir.join(format!("{standard}_validation.json"))
}

/// Merge many report files into one array, sorted by source filename.
///
/// Missing report files are skipped with a warning (a skipped job has no
/// report). Returns the number of reports merged.
pub fn consolidate_reports(paths: &[PathBuf], out: &Path) -> Result<usize> {
    let mut reports = Vec::new();
    for path in paths {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "report missing; skipping in consolidation");
            continue;
        }
        reports.push(UnitReport::read(path)?);
    }
    reports.sort_by(|a, b| a.source.cmp(&b.source));

    let json = serde_json::to_string_pretty(&reports).map_err(|source| {
        ValidateError::ReportJson {
            path: out.display().to_string(),
            source,
        }
    })?;
    std::fs::write(out, json).map_err(|source| ValidateError::ReportIo {
        path: out.display().to_string(),
        source,
    })?;
    tracing::info!(
        merged = reports.len(),
        out = %out.display(),
        "reports consolidated"
    );
    Ok(reports.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(standard: &str, source: &str, conforms: bool) -> UnitReport {
        UnitReport {
            standard: standard.to_string(),
            source: source.to_string(),
            contract: "shapes".to_string(),
            conforms,
            subjects: 2,
            triples: 5,
            parse_errors: 0,
            chunks: vec![],
            started_at: "2026-01-01T00:00:00+00:00".to_string(),
            elapsed_secs: 0.5,
        }
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = report_path_for(dir.path(), "cve");
        let report = sample("cve", "cve.ttl", true);
        report.write(&path).unwrap();

        let back = UnitReport::read(&path).unwrap();
        assert_eq!(back.standard, "cve");
        assert!(back.conforms);
        assert_eq!(back.triples, 5);
    }

    #[test]
    fn test_report_path_is_deterministic() {
        let p = report_path_for(Path::new("reports"), "attack");
        assert_eq!(p, Path::new("reports/attack_validation.json"));
    }

    #[test]
    fn test_consolidation_sorted_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = report_path_for(dir.path(), "cwe");
        let p2 = report_path_for(dir.path(), "cve");
        let missing = report_path_for(dir.path(), "capec");
        sample("cwe", "b-cwe.ttl", true).write(&p1).unwrap();
        sample("cve", "a-cve.ttl", false).write(&p2).unwrap();

        let out = dir.path().join("all.json");
        let merged =
            consolidate_reports(&[p1, p2, missing], &out).unwrap();
        assert_eq!(merged, 2);

        let text = std::fs::read_to_string(&out).unwrap();
        let arr: Vec<UnitReport> = serde_json::from_str(&text).unwrap();
        assert_eq!(arr.len(), 2);
        // Sorted by source filename.
        assert_eq!(arr[0].source, "a-cve.ttl");
        assert_eq!(arr[1].source, "b-cwe.ttl");
    }
}
