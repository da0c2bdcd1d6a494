//! The graph store call boundary and its shipped implementations.
//!
//! The loader needs exactly two capabilities of a store: a batched write and
//! a version-scoped reset. Everything else about the store's protocol is out
//! of scope. Batches for one version scope should be written so that
//! re-running a failed NODES pass before any RELATIONSHIPS write is safe —
//! the JSONL sink does this by truncating a pass's file on its first write
//! of a run.

use crate::classify::Pass;
use crate::error::SinkError;
use rustc_hash::FxHashSet;
use secgraph_ir::Triple;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Opaque version tag stamped on all writes of one pipeline run.
///
/// Distinguishes generations of loaded data without deleting prior
/// generations until explicitly reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbVersion(String);

impl DbVersion {
    /// Create a version tag.
    pub fn new(tag: impl Into<String>) -> Self {
        DbVersion(tag.into())
    }

    /// The tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DbVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bounded, pass-homogeneous group of triples written as one call.
#[derive(Debug, Clone)]
pub struct LoadBatch {
    /// The pass every triple in this batch belongs to.
    pub pass: Pass,
    /// 0-based batch index within its pass.
    pub index: u64,
    /// The triples.
    pub triples: Vec<Triple>,
}

/// The only store capabilities the loader requires.
pub trait GraphStoreSink {
    /// Write one batch under a version scope. Returns the written count.
    fn write_batch(&mut self, batch: &LoadBatch, version: &DbVersion) -> Result<usize, SinkError>;

    /// Irreversibly clear prior data under a version scope.
    fn reset_scope(&mut self, version: &DbVersion) -> Result<(), SinkError>;
}

// ----------------------------------------------------------------------------
// MemorySink — test instrumentation
// ----------------------------------------------------------------------------

/// Record of one write call, for ordering assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Pass the batch belonged to
    pub pass: Pass,
    /// Batch index within the pass
    pub index: u64,
    /// Batch size
    pub len: usize,
}

/// In-memory sink that records every call, with optional injected failure.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Ordered log of successful write calls.
    pub writes: Vec<WriteRecord>,
    /// All triples written, in write order.
    pub triples: Vec<Triple>,
    /// Reset calls received (version tags).
    pub resets: Vec<String>,
    /// Fail the write of this (pass, batch index), once reached.
    pub fail_at: Option<(Pass, u64)>,
}

impl MemorySink {
    /// A sink that accepts everything.
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// A sink that fails the given batch of the given pass.
    pub fn failing_at(pass: Pass, index: u64) -> Self {
        MemorySink {
            fail_at: Some((pass, index)),
            ..MemorySink::default()
        }
    }

    /// Write counts per pass.
    pub fn writes_for(&self, pass: Pass) -> usize {
        self.writes.iter().filter(|w| w.pass == pass).count()
    }
}

impl GraphStoreSink for MemorySink {
    fn write_batch(&mut self, batch: &LoadBatch, _version: &DbVersion) -> Result<usize, SinkError> {
        if self.fail_at == Some((batch.pass, batch.index)) {
            return Err(SinkError::new(format!(
                "injected failure at {} batch {}",
                batch.pass, batch.index
            )));
        }
        self.writes.push(WriteRecord {
            pass: batch.pass,
            index: batch.index,
            len: batch.triples.len(),
        });
        self.triples.extend(batch.triples.iter().cloned());
        Ok(batch.triples.len())
    }

    fn reset_scope(&mut self, version: &DbVersion) -> Result<(), SinkError> {
        self.resets.push(version.as_str().to_string());
        self.writes.clear();
        self.triples.clear();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// JsonlDirSink — file-backed store
// ----------------------------------------------------------------------------

/// One persisted triple row.
#[derive(Debug, Serialize)]
struct JsonlRow<'a> {
    batch: u64,
    triple: &'a Triple,
}

/// File-backed sink: one JSON-lines file per pass under a per-version
/// directory (`<root>/<version>/nodes.jsonl`, `.../relationships.jsonl`).
///
/// The first write a run makes to a (version, pass) file truncates it, so
/// re-running a failed NODES pass never duplicates rows.
pub struct JsonlDirSink {
    root: PathBuf,
    /// (version, pass) files already opened by this run.
    started: FxHashSet<(String, Pass)>,
    writer: Option<(String, Pass, BufWriter<File>)>,
}

impl JsonlDirSink {
    /// Create a sink rooted at `root` (created on demand).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonlDirSink {
            root: root.into(),
            started: FxHashSet::default(),
            writer: None,
        }
    }

    /// Path of one pass's file under a version scope.
    pub fn pass_file(&self, version: &DbVersion, pass: Pass) -> PathBuf {
        self.root
            .join(version.as_str())
            .join(format!("{}.jsonl", pass.label()))
    }

    fn open_writer(
        &mut self,
        version: &DbVersion,
        pass: Pass,
    ) -> Result<&mut BufWriter<File>, SinkError> {
        let key = (version.as_str().to_string(), pass);
        let reuse = matches!(
            &self.writer,
            Some((v, p, _)) if v == version.as_str() && *p == pass
        );
        if !reuse {
            let path = self.pass_file(version, pass);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SinkError::new(format!("create {}: {e}", parent.display())))?;
            }
            // First touch of this (version, pass) in this run truncates;
            // later re-opens (pass interleaved with another scope) append.
            let first_touch = self.started.insert(key.clone());
            let file = if first_touch {
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)
            } else {
                OpenOptions::new().create(true).append(true).open(&path)
            }
            .map_err(|e| SinkError::new(format!("open {}: {e}", path.display())))?;
            self.writer = Some((key.0, pass, BufWriter::new(file)));
        }
        Ok(&mut self.writer.as_mut().expect("writer just set").2)
    }

    fn flush_current(&mut self) -> Result<(), SinkError> {
        if let Some((_, _, w)) = &mut self.writer {
            w.flush().map_err(|e| SinkError::new(format!("flush: {e}")))?;
        }
        Ok(())
    }
}

impl GraphStoreSink for JsonlDirSink {
    fn write_batch(&mut self, batch: &LoadBatch, version: &DbVersion) -> Result<usize, SinkError> {
        let pass = batch.pass;
        let index = batch.index;
        let writer = self.open_writer(version, pass)?;
        for triple in &batch.triples {
            let row = JsonlRow {
                batch: index,
                triple,
            };
            serde_json::to_writer(&mut *writer, &row)
                .map_err(|e| SinkError::new(format!("encode row: {e}")))?;
            writer
                .write_all(b"\n")
                .map_err(|e| SinkError::new(format!("write row: {e}")))?;
        }
        self.flush_current()?;
        Ok(batch.triples.len())
    }

    fn reset_scope(&mut self, version: &DbVersion) -> Result<(), SinkError> {
        self.writer = None;
        let dir = self.root.join(version.as_str());
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .map_err(|e| SinkError::new(format!("reset {}: {e}", dir.display())))?;
        }
        tracing::info!(version = %version, dir = %dir.display(), "store scope reset");
        Ok(())
    }
}
