use clap::Parser;
use mimalloc::MiMalloc;
use secgraph_load::{
    dry_run, load_pass, DbVersion, JsonlDirSink, LoadConfig, Pass,
};
use secgraph_shacl::{ShapeContract, ShapeEngine};
use secgraph_turtle::{ParseMode, ReaderConfig};
use secgraph_validate::{
    consolidate_reports, report_path_for, run_standards, validate_unit, StandardJob, UnitReport,
    ValidateConfig,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod pipeline;

use pipeline::{ingest_dir, ingest_unit, IngestConfig, IngestOutcome};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "secgraph_ingest=info,secgraph_validate=info,secgraph_load=info,secgraph_turtle=info,secgraph_shacl=info",
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact());

    let _ = tracing::dispatcher::set_global_default(tracing::Dispatch::new(subscriber));
}

#[derive(Parser)]
#[command(
    name = "secgraph-ingest",
    about = "Validation-gated bulk ingestion of security-taxonomy graphs"
)]
struct Args {
    /// Serialized graph file for a single unit.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Directory of .ttl units, each orchestrated independently.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Shape contract file (required for --data / --data-dir).
    #[arg(long)]
    shapes: Option<PathBuf>,

    /// Standards manifest (JSON array of jobs); runs validation for every
    /// standard concurrently. Loading is not performed in this mode.
    #[arg(long)]
    standards: Option<PathBuf>,

    /// Validation worker pool size.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Partition size in subjects.
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    /// Per-chunk validation timeout in seconds.
    #[arg(long, default_value_t = 300)]
    per_call_timeout: u64,

    /// Write a machine-readable run summary to this path.
    #[arg(long)]
    summary_report: Option<PathBuf>,

    /// Directory for per-unit validation reports.
    #[arg(long, default_value = "reports")]
    reports_dir: PathBuf,

    /// Merge every per-job report under --reports-dir into one array.
    #[arg(long)]
    consolidate: Option<PathBuf>,

    /// Classify and count only; never contact the store.
    #[arg(long)]
    dry_run: bool,

    /// NODES pass batch size.
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// RELATIONSHIPS pass batch size (defaults to --batch-size).
    #[arg(long)]
    rel_batch_size: Option<usize>,

    /// Version tag stamped on all writes of this run.
    #[arg(long, default_value = "v1")]
    db_version: String,

    /// Clear prior data under the version scope before the NODES pass.
    /// Irreversible.
    #[arg(long)]
    reset_db: bool,

    /// Run only the NODES pass of the loader.
    #[arg(long, conflicts_with = "rels_only")]
    nodes_only: bool,

    /// Run only the RELATIONSHIPS pass. The caller asserts the NODES pass
    /// for this version already completed successfully.
    #[arg(long)]
    rels_only: bool,

    /// Validate only; skip loading entirely.
    #[arg(long)]
    validate_only: bool,

    /// Throughput-optimized lexical parsing. Malformed lines are skipped
    /// silently; only for trusted, previously-validated inputs.
    #[arg(long)]
    fast_parse: bool,

    /// Strict mode: malformed statements tolerated before aborting a unit.
    #[arg(long, default_value_t = 0)]
    max_parse_errors: usize,

    /// One progress line per update instead of a single growing line.
    #[arg(long)]
    progress_newline: bool,

    /// Reader heartbeat interval in seconds (0 disables).
    #[arg(long, default_value_t = 0)]
    parse_heartbeat_seconds: u64,

    /// Root directory of the JSONL graph store.
    #[arg(long, default_value = "graph-store")]
    store_dir: PathBuf,
}

/// One entry of the standards manifest.
#[derive(Debug, Deserialize)]
struct ManifestJob {
    name: String,
    data: PathBuf,
    shapes: PathBuf,
    #[serde(default)]
    report: Option<PathBuf>,
}

fn reader_config(args: &Args) -> ReaderConfig {
    ReaderConfig {
        chunk_subjects: args.chunk_size,
        mode: if args.fast_parse {
            ParseMode::Fast
        } else {
            ParseMode::Strict
        },
        max_parse_errors: args.max_parse_errors,
        heartbeat: match args.parse_heartbeat_seconds {
            0 => None,
            n => Some(Duration::from_secs(n)),
        },
    }
}

fn validate_config(args: &Args) -> ValidateConfig {
    ValidateConfig {
        workers: args.workers,
        chunk_subjects: args.chunk_size,
        per_chunk_timeout: Duration::from_secs(args.per_call_timeout),
        mode: if args.fast_parse {
            ParseMode::Fast
        } else {
            ParseMode::Strict
        },
        max_parse_errors: args.max_parse_errors,
        heartbeat: match args.parse_heartbeat_seconds {
            0 => None,
            n => Some(Duration::from_secs(n)),
        },
    }
}

fn load_config(args: &Args) -> LoadConfig {
    LoadConfig {
        batch_size: args.batch_size,
        rel_batch_size: args.rel_batch_size,
        db_version: DbVersion::new(&args.db_version),
        reset: args.reset_db,
        progress_newline: args.progress_newline,
        heartbeat_batches: 25,
        expected_triples: None,
        reader: reader_config(args),
    }
}

/// Run the standards manifest: every standard validates concurrently.
fn run_standards_mode(args: &Args, manifest: &PathBuf) -> Result<i32, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(manifest)?;
    let entries: Vec<ManifestJob> = serde_json::from_str(&text)?;

    std::fs::create_dir_all(&args.reports_dir)?;
    let jobs: Vec<StandardJob> = entries
        .into_iter()
        .map(|e| {
            let report_path = e
                .report
                .unwrap_or_else(|| report_path_for(&args.reports_dir, &e.name));
            StandardJob {
                name: e.name,
                data_file: e.data,
                shapes_file: e.shapes,
                report_path,
            }
        })
        .collect();
    let report_paths: Vec<PathBuf> = jobs.iter().map(|j| j.report_path.clone()).collect();

    info!(jobs = jobs.len(), "running standards manifest");
    let summary = run_standards(jobs, &validate_config(args));

    if let Some(out) = &args.consolidate {
        consolidate_reports(&report_paths, out)?;
    }

    info!(
        passed = ?summary.passed,
        failed = ?summary.failed,
        skipped = ?summary.skipped,
        "standards summary"
    );
    // Skips never fail the run; real failures do.
    Ok(if summary.has_failures() { 1 } else { 0 })
}

fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    if let Some(manifest) = args.standards.clone() {
        return run_standards_mode(&args, &manifest);
    }

    // Standalone consolidation of previously written reports.
    if let (Some(out), None, None) = (&args.consolidate, &args.data, &args.data_dir) {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&args.reports_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("_validation.json"))
            })
            .collect();
        paths.sort();
        let merged = consolidate_reports(&paths, out)?;
        info!(merged, out = %out.display(), "consolidation complete");
        return Ok(0);
    }

    if args.dry_run {
        let data = args.data.as_ref().ok_or("--dry-run requires --data")?;
        let report = dry_run(data, &load_config(&args))?;
        info!(
            nodes_triples = report.nodes_triples,
            rel_triples = report.rel_triples,
            nodes_batches = report.nodes_batches,
            rel_batches = report.rel_batches,
            estimated_secs = report.estimated_secs,
            "dry run estimate"
        );
        if let Some(path) = &args.summary_report {
            std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        }
        return Ok(0);
    }

    let shapes = args
        .shapes
        .as_ref()
        .ok_or("--shapes is required for --data / --data-dir")?;
    let contract = ShapeContract::load(shapes)?;
    let engine = Arc::new(ShapeEngine::new(contract));
    std::fs::create_dir_all(&args.reports_dir)?;

    let config = IngestConfig {
        validate: validate_config(&args),
        load: load_config(&args),
        reports_dir: args.reports_dir.clone(),
    };

    if let Some(data) = &args.data {
        let name = data
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unit".to_string());

        if args.validate_only {
            let started_at = chrono::Utc::now();
            let verdict = validate_unit(data, &engine, &config.validate)?;
            let report = UnitReport::from_verdict(
                &name,
                data,
                &engine.contract().name,
                started_at,
                &verdict,
            );
            report.write(&report_path_for(&args.reports_dir, &name))?;
            return Ok(if verdict.conforms { 0 } else { 1 });
        }

        if args.nodes_only || args.rels_only {
            // Single-pass loader control. Validation still gates the unit.
            let verdict = validate_unit(data, &engine, &config.validate)?;
            if !verdict.conforms {
                error!(
                    unit = %name,
                    violations = verdict.violation_count(),
                    "unit rejected; selected pass not run"
                );
                return Ok(1);
            }
            let pass = if args.nodes_only {
                Pass::Nodes
            } else {
                Pass::Relationships
            };
            let mut sink = JsonlDirSink::new(&args.store_dir);
            let summary = load_pass(data, pass, &mut sink, &config.load)?;
            info!(pass = %summary.pass, triples = summary.triples, batches = summary.batches, "pass loaded");
            return Ok(0);
        }

        let mut sink = JsonlDirSink::new(&args.store_dir);
        return Ok(
            match ingest_unit(&name, data, &engine, &mut sink, &config)? {
                IngestOutcome::Accepted(_) => 0,
                IngestOutcome::Rejected(_) => 1,
            },
        );
    }

    if let Some(dir) = &args.data_dir {
        let mut sink = JsonlDirSink::new(&args.store_dir);
        let totals = ingest_dir(dir, &engine, &mut sink, &config)?;
        if let Some(path) = &args.summary_report {
            let summary = serde_json::json!({
                "accepted": totals.accepted,
                "rejected": totals.rejected,
                "failed": totals.failed,
            });
            std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        }
        return Ok(if totals.has_problems() { 1 } else { 0 });
    }

    Err("one of --data, --data-dir, or --standards is required".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();
    let code = run(args)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
