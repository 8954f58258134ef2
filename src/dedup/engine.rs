use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};

use log::debug;

use super::counters::Counters;
use crate::cigar::Signature;
use crate::errors::{DedupError, Result};
use crate::record::{is_header, AlignmentRecord};
use crate::umi::UmiWhitelist;

/// Outcome for one input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Written to the output (header lines and first occurrences)
    Keep,
    /// Duplicate of a record already kept on this chromosome
    Drop,
    /// UMI not in the whitelist; dropped
    Invalid,
}

/// Signatures kept so far on the current chromosome, by UMI
#[derive(Debug, Default)]
pub struct ChromosomeState {
    seen: HashMap<String, HashSet<Signature>>,
}

impl ChromosomeState {
    /// Records `signature` for `umi`. Returns false if it was already present.
    pub fn insert(&mut self, umi: &str, signature: Signature) -> bool {
        match self.seen.get_mut(umi) {
            Some(signatures) => signatures.insert(signature),
            None => {
                self.seen.insert(umi.to_string(), HashSet::from([signature]));
                true
            }
        }
    }

    #[cfg(test)]
    fn contains(&self, umi: &str, signature: &Signature) -> bool {
        self.seen.get(umi).is_some_and(|signatures| signatures.contains(signature))
    }

    /// Number of distinct UMIs seen.
    #[must_use]
    pub fn umis(&self) -> usize {
        self.seen.len()
    }

    /// Number of (UMI, signature) pairs held.
    #[must_use]
    pub fn signatures(&self) -> usize {
        self.seen.values().map(HashSet::len).sum()
    }
}

/// Tracks the chromosome being processed and rejects a return to one already left.
///
/// Deduplication state is only kept for one chromosome at a time, so a
/// chromosome split across the file would silently keep duplicates.
#[derive(Debug, Default)]
pub struct SortGuard {
    current: Option<String>,
    left: HashSet<String>,
}

impl SortGuard {
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Moves to `chrom`. Returns true if it differs from the current chromosome.
    pub fn observe(&mut self, chrom: &str) -> Result<bool> {
        if self.current.as_deref() == Some(chrom) {
            return Ok(false);
        }
        if self.left.contains(chrom) {
            return Err(DedupError::UnsortedInput { chrom: chrom.to_string() });
        }
        if let Some(previous) = self.current.replace(chrom.to_string()) {
            self.left.insert(previous);
        }
        Ok(true)
    }
}

/// Streaming deduplicator for a chromosome-sorted SAM file.
///
/// The engine is idle until the first whitelisted data record, then
/// processes one chromosome at a time; moving to a new chromosome drops the
/// previous chromosome's state entirely.
#[derive(Debug)]
pub struct DedupEngine<'w> {
    whitelist: &'w UmiWhitelist,
    guard: SortGuard,
    state: ChromosomeState,
    counters: Counters,
}

impl<'w> DedupEngine<'w> {
    #[must_use]
    pub fn new(whitelist: &'w UmiWhitelist) -> Self {
        Self {
            whitelist,
            guard: SortGuard::default(),
            state: ChromosomeState::default(),
            counters: Counters::default(),
        }
    }

    /// The chromosome whose state is live, or `None` while idle.
    #[must_use]
    pub fn current_chromosome(&self) -> Option<&str> {
        self.guard.current()
    }

    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    #[must_use]
    pub fn state(&self) -> &ChromosomeState {
        &self.state
    }

    /// Decides whether `line` is kept, updating state and counters.
    pub fn process_record(&mut self, line: &str) -> Result<Decision> {
        if is_header(line) {
            self.counters.headers += 1;
            return Ok(Decision::Keep);
        }

        let record = AlignmentRecord::parse(line)?;
        let umi = record.umi();
        if !self.whitelist.is_known(umi) {
            self.counters.invalid_umis += 1;
            return Ok(Decision::Invalid);
        }

        if self.guard.observe(record.chrom)? {
            debug!(
                "Starting chromosome '{}' (discarding {} UMIs / {} signatures)",
                record.chrom,
                self.state.umis(),
                self.state.signatures()
            );
            self.state = ChromosomeState::default();
        }

        let signature = record.signature()?;
        if self.state.insert(umi, signature) {
            self.counters.unique += 1;
            Ok(Decision::Keep)
        } else {
            self.counters.duplicates += 1;
            Ok(Decision::Drop)
        }
    }

    /// Processes every line of `reader`, writing kept lines to `writer` in input order.
    ///
    /// Blank lines are skipped. Errors carry the 1-based line number.
    pub fn run<R: BufRead, W: Write + ?Sized>(&mut self, reader: R, writer: &mut W) -> Result<()> {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index as u64 + 1;
            let decision =
                self.process_record(&line).map_err(|e| e.at_line(line_number, &line))?;
            if decision == Decision::Keep {
                writeln!(writer, "{line}")?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Ends the run and returns the final counters.
    #[must_use]
    pub fn finish(self) -> Counters {
        self.counters
    }
}
