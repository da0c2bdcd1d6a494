//! Streaming subject-aligned chunk reader.
//!
//! [`ChunkedTripleReader`] walks a serialized graph file once, front to back,
//! and yields [`EntityPartition`]s of roughly `chunk_subjects` subjects each.
//! A partition only closes at a subject boundary, so a contiguous run of one
//! subject's statements is never split — validators see a subject's full
//! triple set in one call. The whole file is never materialized; memory is
//! bounded by one partition plus one line.
//!
//! The reader is forward-only and restartable only by re-opening the source.

use crate::error::{Result, TurtleError};
use crate::statement::{
    parse_directive, parse_statement, parse_statement_fast, strip_comment, Directive, Prefixes,
};
use rustc_hash::FxHashSet;
use secgraph_ir::{EntityPartition, Triple};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback for heartbeat progress: `(subjects_so_far, triples_so_far)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Parsing fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Full statement parse into typed terms; malformed statements are
    /// line-numbered errors subject to the tolerance threshold.
    #[default]
    Strict,
    /// Lightweight lexical splitting without escape validation. Malformed
    /// lines are silently skipped (counted). Only for trusted inputs.
    Fast,
}

/// Reader configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Target partition size in subjects. Partitions may close one subject
    /// late because boundaries align to subject runs.
    pub chunk_subjects: usize,
    /// Parsing fidelity mode.
    pub mode: ParseMode,
    /// Strict mode: number of malformed statements tolerated before the read
    /// aborts. 0 means abort on the first error.
    pub max_parse_errors: usize,
    /// Wall-clock heartbeat interval for progress reporting. `None` disables.
    pub heartbeat: Option<Duration>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            chunk_subjects: 500,
            mode: ParseMode::Strict,
            max_parse_errors: 0,
            heartbeat: None,
        }
    }
}

/// Streaming reader over a serialized graph file.
pub struct ChunkedTripleReader {
    reader: BufReader<File>,
    config: ReaderConfig,
    prefixes: Prefixes,
    progress: Option<ProgressFn>,

    line_no: u64,
    data_started: bool,
    finished: bool,

    current: EntityPartition,
    current_subject: Option<String>,
    subjects_in_current: usize,
    /// Subject keys already closed within the current partition, for the
    /// non-contiguity diagnostic. Bounded by partition size.
    partition_subjects: FxHashSet<String>,
    next_id: usize,

    parse_errors: usize,
    skipped_lines: u64,
    subjects_total: u64,
    triples_total: u64,
    last_beat: Instant,
}

impl ChunkedTripleReader {
    /// Open a source file for chunked reading.
    ///
    /// Fails fast when the file cannot be opened — a missing data file is a
    /// configuration error, not a data error.
    pub fn open(path: &Path, config: &ReaderConfig) -> Result<Self> {
        Self::open_with_progress(path, config, None)
    }

    /// Open with an optional heartbeat callback (invoked in addition to the
    /// heartbeat log line).
    pub fn open_with_progress(
        path: &Path,
        config: &ReaderConfig,
        progress: Option<ProgressFn>,
    ) -> Result<Self> {
        let file = File::open(path)?;
        tracing::debug!(
            path = %path.display(),
            chunk_subjects = config.chunk_subjects,
            mode = ?config.mode,
            "opening chunked reader"
        );
        Ok(ChunkedTripleReader {
            reader: BufReader::new(file),
            config: config.clone(),
            prefixes: Prefixes::default(),
            progress,
            line_no: 0,
            data_started: false,
            finished: false,
            current: EntityPartition::new(0),
            current_subject: None,
            subjects_in_current: 0,
            partition_subjects: FxHashSet::default(),
            next_id: 1,
            parse_errors: 0,
            skipped_lines: 0,
            subjects_total: 0,
            triples_total: 0,
            last_beat: Instant::now(),
        })
    }

    /// Declared prefixes seen so far.
    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// Malformed statements encountered (strict mode, within tolerance).
    pub fn parse_errors(&self) -> usize {
        self.parse_errors
    }

    /// Lines skipped in fast mode.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Subjects read so far.
    pub fn subjects_read(&self) -> u64 {
        self.subjects_total
    }

    /// Triples read so far.
    pub fn triples_read(&self) -> u64 {
        self.triples_total
    }

    fn beat(&mut self) {
        let Some(interval) = self.config.heartbeat else {
            return;
        };
        if self.last_beat.elapsed() < interval {
            return;
        }
        self.last_beat = Instant::now();
        tracing::info!(
            subjects = self.subjects_total,
            triples = self.triples_total,
            line = self.line_no,
            "reader heartbeat"
        );
        if let Some(cb) = &self.progress {
            cb(self.subjects_total, self.triples_total);
        }
    }

    /// Record a strict-mode parse error; fatal once the tolerance is exceeded.
    fn record_parse_error(&mut self, err: TurtleError) -> Result<()> {
        self.parse_errors += 1;
        tracing::warn!(error = %err, "malformed statement");
        if self.parse_errors > self.config.max_parse_errors {
            return Err(TurtleError::TooManyParseErrors {
                tolerance: self.config.max_parse_errors,
                line: self.line_no,
            });
        }
        Ok(())
    }

    /// Push a parsed triple, closing the current partition first when it is
    /// full and the subject changes. Returns the closed partition, if any.
    fn push_triple(&mut self, triple: Triple) -> Option<EntityPartition> {
        let key = triple.subject_key();
        let mut emitted = None;

        if self.current_subject.as_deref() != Some(key.as_str()) {
            // Subject boundary.
            if self.subjects_in_current >= self.config.chunk_subjects {
                let id = self.next_id;
                self.next_id += 1;
                emitted = Some(std::mem::replace(
                    &mut self.current,
                    EntityPartition::new(id),
                ));
                self.subjects_in_current = 0;
                self.partition_subjects.clear();
            }
            if !self.partition_subjects.insert(key.clone()) {
                tracing::debug!(
                    subject = %key,
                    line = self.line_no,
                    "subject reappeared non-contiguously; its runs will land in separate groups"
                );
            }
            self.subjects_in_current += 1;
            self.subjects_total += 1;
            self.current_subject = Some(key);
        }

        self.current.triples.push(triple);
        self.triples_total += 1;
        emitted
    }

    fn apply_directive(&mut self, directive: Directive) -> Result<()> {
        if self.data_started {
            match self.config.mode {
                ParseMode::Strict => {
                    return Err(TurtleError::DirectiveAfterData { line: self.line_no })
                }
                ParseMode::Fast => {
                    // Tolerated in fast mode; applied so later statements
                    // still resolve.
                    tracing::warn!(line = self.line_no, "directive after data; applying anyway");
                }
            }
        }
        match directive {
            Directive::Prefix(p, iri) => self.prefixes.declare(&p, &iri),
            Directive::Base(iri) => self.prefixes.set_base(&iri),
        }
        Ok(())
    }

    /// Advance until the next partition is complete (or EOF).
    fn next_partition(&mut self) -> Result<Option<EntityPartition>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                // EOF: flush the trailing partial partition.
                self.finished = true;
                if self.current.is_empty() {
                    return Ok(None);
                }
                let last = std::mem::take(&mut self.current);
                tracing::debug!(
                    partitions = last.id + 1,
                    subjects = self.subjects_total,
                    triples = self.triples_total,
                    parse_errors = self.parse_errors,
                    "reader finished"
                );
                return Ok(Some(last));
            }
            self.line_no += 1;
            self.beat();

            let content = strip_comment(&line);
            let content = content.trim();
            if content.is_empty() {
                continue;
            }

            match parse_directive(content, self.line_no) {
                Ok(Some(directive)) => {
                    self.apply_directive(directive)?;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    // Started like a directive but malformed.
                    match self.config.mode {
                        ParseMode::Strict => self.record_parse_error(e)?,
                        ParseMode::Fast => self.skipped_lines += 1,
                    }
                    continue;
                }
            }

            self.data_started = true;
            let triple = match self.config.mode {
                ParseMode::Strict => match parse_statement(content, self.line_no, &self.prefixes) {
                    Ok(t) => t,
                    Err(e) => {
                        self.record_parse_error(e)?;
                        continue;
                    }
                },
                ParseMode::Fast => match parse_statement_fast(content, &self.prefixes) {
                    Some(t) => t,
                    None => {
                        self.skipped_lines += 1;
                        tracing::debug!(line = self.line_no, "fast mode: skipped malformed line");
                        continue;
                    }
                },
            };

            if let Some(done) = self.push_triple(triple) {
                return Ok(Some(done));
            }
        }
    }
}

impl Iterator for ChunkedTripleReader {
    type Item = Result<EntityPartition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_partition() {
            Ok(Some(p)) => Some(Ok(p)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    const FIXTURE: &str = "\
# security taxonomy fixture
@prefix ex: <http://example.org/> .
@prefix cve: <http://secgraph.org/vuln/cve#> .

cve:CVE-2024-0001 a ex:Vulnerability .
cve:CVE-2024-0001 ex:score 9.8 .
cve:CVE-2024-0001 ex:summary \"heap overflow\" .
cve:CVE-2024-0002 a ex:Vulnerability .
cve:CVE-2024-0002 ex:refersTo cve:CVE-2024-0001 .
ex:product-1 a ex:Platform .
ex:product-1 ex:vendor \"acme\" .
";

    fn read_all(content: &str, config: &ReaderConfig) -> Vec<EntityPartition> {
        let f = write_temp(content);
        ChunkedTripleReader::open(f.path(), config)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_completeness_across_chunk_sizes() {
        // Concatenating the partitions must reproduce the input's triple
        // sequence exactly, for any chunk size.
        let whole = read_all(
            FIXTURE,
            &ReaderConfig {
                chunk_subjects: usize::MAX,
                ..ReaderConfig::default()
            },
        );
        assert_eq!(whole.len(), 1);
        let all: Vec<_> = whole[0].triples.clone();
        assert_eq!(all.len(), 7);

        for chunk_subjects in 1..=4 {
            let parts = read_all(
                FIXTURE,
                &ReaderConfig {
                    chunk_subjects,
                    ..ReaderConfig::default()
                },
            );
            let concat: Vec<_> = parts.iter().flat_map(|p| p.triples.clone()).collect();
            assert_eq!(concat, all, "chunk_subjects={chunk_subjects}");
            // Sequential ids from 0.
            for (i, p) in parts.iter().enumerate() {
                assert_eq!(p.id, i);
            }
        }
    }

    #[test]
    fn test_subjects_never_split() {
        for chunk_subjects in 1..=3 {
            let parts = read_all(
                FIXTURE,
                &ReaderConfig {
                    chunk_subjects,
                    ..ReaderConfig::default()
                },
            );
            let mut seen = FxHashSet::default();
            for p in &parts {
                let mut in_this: FxHashSet<String> = FxHashSet::default();
                for t in &p.triples {
                    in_this.insert(t.subject_key());
                }
                for key in in_this {
                    assert!(
                        seen.insert(key.clone()),
                        "subject {key} split across partitions (chunk_subjects={chunk_subjects})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_chunk_size_one_subject_per_partition() {
        let parts = read_all(
            FIXTURE,
            &ReaderConfig {
                chunk_subjects: 1,
                ..ReaderConfig::default()
            },
        );
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].subject_count(), 1);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 2);
    }

    #[test]
    fn test_strict_aborts_on_first_error_by_default() {
        let bad = "\
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b .
this line is hopeless
ex:c ex:p ex:d .
";
        let f = write_temp(bad);
        let reader = ChunkedTripleReader::open(f.path(), &ReaderConfig::default()).unwrap();
        let result: Result<Vec<_>> = reader.collect();
        assert!(matches!(
            result,
            Err(TurtleError::TooManyParseErrors { tolerance: 0, line: 3 })
        ));
    }

    #[test]
    fn test_strict_tolerance_skips_and_reports() {
        let bad = "\
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b .
this line is hopeless
ex:c ex:p ex:d .
";
        let f = write_temp(bad);
        let mut reader = ChunkedTripleReader::open(
            f.path(),
            &ReaderConfig {
                max_parse_errors: 5,
                ..ReaderConfig::default()
            },
        )
        .unwrap();
        let parts: Vec<_> = (&mut reader).collect::<Result<Vec<_>>>().unwrap();
        let total: usize = parts.iter().map(|p| p.len()).sum();
        assert_eq!(total, 2);
        assert_eq!(reader.parse_errors(), 1);
    }

    #[test]
    fn test_fast_mode_skips_malformed_silently() {
        let bad = "\
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b .
this line is hopeless
ex:c ex:p \"literal with \\\"edge\\\" escaping\" .
";
        let f = write_temp(bad);
        let mut reader = ChunkedTripleReader::open(
            f.path(),
            &ReaderConfig {
                mode: ParseMode::Fast,
                ..ReaderConfig::default()
            },
        )
        .unwrap();
        let parts: Vec<_> = (&mut reader).collect::<Result<Vec<_>>>().unwrap();
        let total: usize = parts.iter().map(|p| p.len()).sum();
        assert_eq!(total, 2);
        assert_eq!(reader.skipped_lines(), 1);
    }

    #[test]
    fn test_directive_after_data_is_strict_error() {
        let bad = "\
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b .
@prefix late: <http://late.org/> .
";
        let f = write_temp(bad);
        let reader = ChunkedTripleReader::open(f.path(), &ReaderConfig::default()).unwrap();
        let result: Result<Vec<_>> = reader.collect();
        assert!(matches!(
            result,
            Err(TurtleError::DirectiveAfterData { line: 3 })
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result =
            ChunkedTripleReader::open(Path::new("/nonexistent/data.ttl"), &ReaderConfig::default());
        assert!(matches!(result, Err(TurtleError::Io(_))));
    }

    #[test]
    fn test_comments_and_crlf() {
        let input = "@prefix ex: <http://example.org/> .\r\n# comment\r\nex:a ex:p ex:b . # trailing\r\n";
        let parts = read_all(input, &ReaderConfig::default());
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 1);
    }

    #[test]
    fn test_heartbeat_callback_fires() {
        let beats = Arc::new(AtomicU64::new(0));
        let beats_cb = Arc::clone(&beats);
        let f = write_temp(FIXTURE);
        let reader = ChunkedTripleReader::open_with_progress(
            f.path(),
            &ReaderConfig {
                heartbeat: Some(Duration::ZERO),
                ..ReaderConfig::default()
            },
            Some(Arc::new(move |_s, _t| {
                beats_cb.fetch_add(1, Ordering::Relaxed);
            })),
        )
        .unwrap();
        let _: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert!(beats.load(Ordering::Relaxed) > 0);
    }
}
