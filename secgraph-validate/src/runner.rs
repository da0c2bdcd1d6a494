//! The parallel standard runner.
//!
//! Each standard (a data file + contract file + report path) runs its full
//! validation pipeline on its own thread of control, inside a `tracing` span
//! carrying the standard name so interleaved output stays attributable. A
//! job whose inputs are missing is *skipped* — reported, never an error —
//! and every job runs to completion regardless of sibling outcomes.

use crate::report::UnitReport;
use crate::scheduler::{validate_unit, ValidateConfig};
use secgraph_shacl::{ShapeContract, ShapeEngine};
use std::path::PathBuf;
use std::sync::Arc;

/// One standard's validation job.
#[derive(Debug, Clone)]
pub struct StandardJob {
    /// Standard name (e.g. "cve", "attack")
    pub name: String,
    /// Serialized graph data for this standard
    pub data_file: PathBuf,
    /// Shape contract for this standard
    pub shapes_file: PathBuf,
    /// Where to write the structured report
    pub report_path: PathBuf,
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Unit validated and conformed
    Passed,
    /// Unit validated and did not conform, or the job errored
    Failed(String),
    /// Data or contract file absent; job not run
    Skipped(String),
}

/// Aggregate outcome across all jobs.
#[derive(Debug, Clone, Default)]
pub struct RunnerSummary {
    /// Jobs whose unit conformed
    pub passed: Vec<String>,
    /// Jobs that errored or did not conform
    pub failed: Vec<String>,
    /// Jobs skipped for missing inputs
    pub skipped: Vec<String>,
}

impl RunnerSummary {
    /// True when any job failed. Skips are not failures.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Run every job's validation concurrently; let them all finish.
///
/// Returns the per-job outcomes. The caller decides whether failures are
/// fatal to the overall run (the CLI maps "any failed" to a non-zero exit).
pub fn run_standards(jobs: Vec<StandardJob>, config: &ValidateConfig) -> RunnerSummary {
    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let config = config.clone();
        let name = job.name.clone();
        let handle = std::thread::Builder::new()
            .name(format!("standard-{name}"))
            .spawn(move || {
                let span = tracing::info_span!("standard", standard = %job.name);
                let _guard = span.enter();
                run_job(&job, &config)
            });
        match handle {
            Ok(h) => handles.push((name, h)),
            Err(e) => {
                tracing::error!(standard = %name, error = %e, "failed to spawn job thread");
                handles.push((
                    name.clone(),
                    // Degenerate: record as failed via a finished thread.
                    std::thread::spawn(move || JobOutcome::Failed(format!("spawn failed: {e}"))),
                ));
            }
        }
    }

    let mut summary = RunnerSummary::default();
    for (name, handle) in handles {
        let outcome = handle
            .join()
            .unwrap_or_else(|_| JobOutcome::Failed("job thread panicked".to_string()));
        match outcome {
            JobOutcome::Passed => summary.passed.push(name),
            JobOutcome::Failed(reason) => {
                tracing::error!(standard = %name, reason = %reason, "standard failed");
                summary.failed.push(name);
            }
            JobOutcome::Skipped(reason) => {
                tracing::warn!(standard = %name, reason = %reason, "standard skipped");
                summary.skipped.push(name);
            }
        }
    }

    tracing::info!(
        passed = summary.passed.len(),
        failed = summary.failed.len(),
        skipped = summary.skipped.len(),
        "standards run complete"
    );
    summary
}

fn run_job(job: &StandardJob, config: &ValidateConfig) -> JobOutcome {
    // Absent inputs are a skip, not an error.
    if !job.data_file.exists() {
        return JobOutcome::Skipped(format!("data file {} not found", job.data_file.display()));
    }
    if !job.shapes_file.exists() {
        return JobOutcome::Skipped(format!(
            "shapes file {} not found",
            job.shapes_file.display()
        ));
    }

    let started_at = chrono::Utc::now();
    let contract = match ShapeContract::load(&job.shapes_file) {
        Ok(c) => c,
        Err(e) => return JobOutcome::Failed(e.to_string()),
    };
    let contract_name = contract.name.clone();
    let engine = Arc::new(ShapeEngine::new(contract));

    let verdict = match validate_unit(&job.data_file, &engine, config) {
        Ok(v) => v,
        Err(e) => return JobOutcome::Failed(e.to_string()),
    };

    let report = UnitReport::from_verdict(
        &job.name,
        &job.data_file,
        &contract_name,
        started_at,
        &verdict,
    );
    if let Err(e) = report.write(&job.report_path) {
        return JobOutcome::Failed(e.to_string());
    }

    if verdict.conforms {
        tracing::info!(
            subjects = verdict.subjects,
            triples = verdict.triples,
            "standard conformed"
        );
        JobOutcome::Passed
    } else {
        JobOutcome::Failed(format!(
            "{} violation(s) across {} chunk(s)",
            verdict.violation_count(),
            verdict.chunk_verdicts.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::report_path_for;
    use std::io::Write;
    use std::path::Path;

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

    const GOOD_DATA: &str = "\
@prefix cve: <http://secgraph.org/vuln/cve#> .
cve:A a cve:Vulnerability .
cve:A cve:id \"CVE-2024-0001\" .
";

    const BAD_DATA: &str = "\
@prefix cve: <http://secgraph.org/vuln/cve#> .
cve:B a cve:Vulnerability .
";

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_data_skips_sibling_completes() {
        // Two standards, one with a missing data file: the runner reports it
        // skipped while the other job still completes and is reported.
        let dir = tempfile::tempdir().unwrap();
        let shapes = write_file(dir.path(), "shapes.json", CONTRACT);
        let data = write_file(dir.path(), "cve.ttl", GOOD_DATA);

        let jobs = vec![
            StandardJob {
                name: "cve".to_string(),
                data_file: data,
                shapes_file: shapes.clone(),
                report_path: report_path_for(dir.path(), "cve"),
            },
            StandardJob {
                name: "ghost".to_string(),
                data_file: dir.path().join("missing.ttl"),
                shapes_file: shapes,
                report_path: report_path_for(dir.path(), "ghost"),
            },
        ];

        let summary = run_standards(jobs, &ValidateConfig::default());
        assert_eq!(summary.passed, vec!["cve".to_string()]);
        assert_eq!(summary.skipped, vec!["ghost".to_string()]);
        assert!(!summary.has_failures());

        // The surviving job's report exists; the skipped job wrote none.
        assert!(report_path_for(dir.path(), "cve").exists());
        assert!(!report_path_for(dir.path(), "ghost").exists());
    }

    #[test]
    fn test_nonconforming_job_fails_but_all_jobs_finish() {
        let dir = tempfile::tempdir().unwrap();
        let shapes = write_file(dir.path(), "shapes.json", CONTRACT);
        let good = write_file(dir.path(), "good.ttl", GOOD_DATA);
        let bad = write_file(dir.path(), "bad.ttl", BAD_DATA);

        let jobs = vec![
            StandardJob {
                name: "good".to_string(),
                data_file: good,
                shapes_file: shapes.clone(),
                report_path: report_path_for(dir.path(), "good"),
            },
            StandardJob {
                name: "bad".to_string(),
                data_file: bad,
                shapes_file: shapes,
                report_path: report_path_for(dir.path(), "bad"),
            },
        ];

        let summary = run_standards(jobs, &ValidateConfig::default());
        assert_eq!(summary.passed, vec!["good".to_string()]);
        assert_eq!(summary.failed, vec!["bad".to_string()]);
        assert!(summary.has_failures());

        // The failing job still produced a structured report for inspection.
        let report = UnitReport::read(&report_path_for(dir.path(), "bad")).unwrap();
        assert!(!report.conforms);
        assert!(report.violation_count() >= 1);
    }
}
