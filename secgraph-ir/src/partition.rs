//! Subject-aligned partitions — the unit of validation and loading.

use crate::{Term, Triple};
use serde::{Deserialize, Serialize};

/// A bounded, ordered group of triples sharing subject locality.
///
/// # Invariants
///
/// - Every triple of the source belongs to exactly one partition per pass.
/// - A contiguous run of statements for one subject is never split across
///   two partitions, for any chunk size >= 1 subject — a validator must see
///   a subject's full triple set in one call.
/// - Partition ids are sequential from 0 in source order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntityPartition {
    /// Sequential partition id (0-based, source order).
    pub id: usize,
    /// Triples in source order.
    pub triples: Vec<Triple>,
}

impl EntityPartition {
    /// Create an empty partition with the given id.
    pub fn new(id: usize) -> Self {
        EntityPartition {
            id,
            triples: Vec::new(),
        }
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// True when the partition holds no triples.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Number of distinct subjects, counting contiguous runs.
    pub fn subject_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<&Term> = None;
        for t in &self.triples {
            if last != Some(&t.s) {
                count += 1;
                last = Some(&t.s);
            }
        }
        count
    }

    /// Iterate the partition grouped by contiguous subject run.
    ///
    /// Yields `(subject, triples)` slices in source order. This is the view
    /// the conformance engine consumes.
    pub fn subjects(&self) -> SubjectRuns<'_> {
        SubjectRuns {
            triples: &self.triples,
            pos: 0,
        }
    }
}

/// Iterator over contiguous subject runs of a partition.
pub struct SubjectRuns<'a> {
    triples: &'a [Triple],
    pos: usize,
}

impl<'a> Iterator for SubjectRuns<'a> {
    type Item = (&'a Term, &'a [Triple]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.triples.len() {
            return None;
        }
        let start = self.pos;
        let subject = &self.triples[start].s;
        let mut end = start + 1;
        while end < self.triples.len() && &self.triples[end].s == subject {
            end += 1;
        }
        self.pos = end;
        Some((subject, &self.triples[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(Term::iri(s), Term::iri(p), Term::string(o))
    }

    #[test]
    fn test_subject_count_contiguous_runs() {
        let mut part = EntityPartition::new(0);
        part.triples.push(t("http://e/a", "http://e/p", "1"));
        part.triples.push(t("http://e/a", "http://e/q", "2"));
        part.triples.push(t("http://e/b", "http://e/p", "3"));
        assert_eq!(part.subject_count(), 2);
        assert_eq!(part.len(), 3);
    }

    #[test]
    fn test_subject_runs_iterator() {
        let mut part = EntityPartition::new(0);
        part.triples.push(t("http://e/a", "http://e/p", "1"));
        part.triples.push(t("http://e/a", "http://e/q", "2"));
        part.triples.push(t("http://e/b", "http://e/p", "3"));

        let runs: Vec<_> = part.subjects().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].1.len(), 2);
        assert_eq!(runs[1].1.len(), 1);
        assert_eq!(runs[1].0.as_iri(), Some("http://e/b"));
    }

    #[test]
    fn test_empty_partition() {
        let part = EntityPartition::new(3);
        assert!(part.is_empty());
        assert_eq!(part.subject_count(), 0);
        assert_eq!(part.subjects().count(), 0);
    }
}
