//! Parallel deduplication across chromosomes.
//!
//! The sorted input is cut into contiguous chromosome blocks exactly where
//! the sequential engine would reset its state. Blocks are independent, so a
//! batch of them is deduplicated on the rayon pool and the results are
//! written back in input order.

use std::io::{BufRead, Lines, Write};

use log::debug;
use rayon::prelude::*;

use super::counters::Counters;
use super::engine::{DedupEngine, Decision, SortGuard};
use crate::errors::{DedupError, Result};
use crate::record::{is_header, umi_from_qname};
use crate::umi::UmiWhitelist;

/// Consecutive input lines belonging to one chromosome
#[derive(Debug, Default)]
pub struct ChromosomeBlock {
    /// Chromosome of the block's whitelisted records, if any
    pub chrom: Option<String>,
    /// `(1-based line number, line)` pairs
    pub lines: Vec<(u64, String)>,
}

/// Result of deduplicating one block: indices of kept lines plus counts.
/// On failure, `kept` holds the lines kept before the failing record.
#[derive(Debug)]
struct BlockOutcome {
    kept: Vec<usize>,
    counters: Counters,
    error: Option<DedupError>,
}

/// Returns the chromosome at which a line would move the engine, if any.
///
/// Only whitelisted data records move the engine; headers, unknown UMIs and
/// lines too short to carry a chromosome stay in the current block.
fn block_key<'a>(line: &'a str, whitelist: &UmiWhitelist) -> Option<&'a str> {
    if is_header(line) {
        return None;
    }
    let mut fields = line.split('\t');
    let qname = fields.next()?;
    if !whitelist.is_known(umi_from_qname(qname)) {
        return None;
    }
    fields.nth(1)
}

/// Splits a line stream into chromosome blocks
pub struct BlockSplitter<'w, R> {
    lines: Lines<R>,
    whitelist: &'w UmiWhitelist,
    guard: SortGuard,
    line_number: u64,
    /// First line of the next block, already read
    pending: Option<(u64, String, String)>,
    /// Error to report once the block preceding it has been handed out
    pending_error: Option<DedupError>,
    done: bool,
}

impl<'w, R: BufRead> BlockSplitter<'w, R> {
    pub fn new(reader: R, whitelist: &'w UmiWhitelist) -> Self {
        Self {
            lines: reader.lines(),
            whitelist,
            guard: SortGuard::default(),
            line_number: 0,
            pending: None,
            pending_error: None,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for BlockSplitter<'_, R> {
    type Item = Result<ChromosomeBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            self.done = true;
            return Some(Err(e));
        }
        if self.done {
            return None;
        }

        let mut block = ChromosomeBlock::default();
        if let Some((number, line, chrom)) = self.pending.take() {
            block.chrom = Some(chrom);
            block.lines.push((number, line));
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.pending_error = Some(e.into());
                    break;
                }
                None => {
                    self.done = true;
                    break;
                }
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let Some(chrom) = block_key(&line, self.whitelist) else {
                block.lines.push((self.line_number, line));
                continue;
            };
            let chrom = chrom.to_string();
            match self.guard.observe(&chrom) {
                Err(e) => {
                    self.pending_error = Some(e.at_line(self.line_number, &line));
                    break;
                }
                Ok(true) if block.chrom.is_some() => {
                    self.pending = Some((self.line_number, line, chrom));
                    break;
                }
                Ok(_) => {
                    block.chrom.get_or_insert(chrom);
                    block.lines.push((self.line_number, line));
                }
            }
        }

        if block.lines.is_empty() {
            return self.next();
        }
        Some(Ok(block))
    }
}

fn dedup_block(block: &ChromosomeBlock, whitelist: &UmiWhitelist) -> BlockOutcome {
    let mut engine = DedupEngine::new(whitelist);
    let mut kept = Vec::new();
    for (index, (number, line)) in block.lines.iter().enumerate() {
        match engine.process_record(line) {
            Ok(Decision::Keep) => kept.push(index),
            Ok(_) => {}
            Err(e) => {
                let error = Some(e.at_line(*number, line));
                return BlockOutcome { kept, counters: engine.finish(), error };
            }
        }
    }
    BlockOutcome { kept, counters: engine.finish(), error: None }
}

/// Deduplicates `reader` into `writer`, processing up to `threads` chromosome
/// blocks at a time on the global rayon pool.
pub fn dedup_blocks<R: BufRead, W: Write + ?Sized>(
    reader: R,
    writer: &mut W,
    whitelist: &UmiWhitelist,
    threads: usize,
) -> Result<Counters> {
    let batch_size = threads.max(1);
    let mut splitter = BlockSplitter::new(reader, whitelist);
    let mut counters = Counters::default();

    loop {
        let mut batch = Vec::with_capacity(batch_size);
        let mut split_error = None;
        while batch.len() < batch_size {
            match splitter.next() {
                Some(Ok(block)) => batch.push(block),
                Some(Err(e)) => {
                    split_error = Some(e);
                    break;
                }
                None => break,
            }
        }
        if batch.is_empty() && split_error.is_none() {
            break;
        }

        debug!(
            "Deduplicating {} blocks: {:?}",
            batch.len(),
            batch.iter().map(|b| b.chrom.as_deref().unwrap_or("-")).collect::<Vec<_>>()
        );
        let outcomes: Vec<BlockOutcome> =
            batch.par_iter().map(|block| dedup_block(block, whitelist)).collect();

        // Write in block order, stopping after the first failing record
        for (block, outcome) in batch.iter().zip(outcomes) {
            for &index in &outcome.kept {
                writeln!(writer, "{}", block.lines[index].1)?;
            }
            counters += outcome.counters;
            if let Some(e) = outcome.error {
                writer.flush()?;
                return Err(e);
            }
        }

        if let Some(e) = split_error {
            writer.flush()?;
            return Err(e);
        }
    }

    writer.flush()?;
    Ok(counters)
}
