mod blocks;
mod counters;
mod engine;

use std::io::{BufRead, Write};

use crate::errors::Result;
use crate::umi::UmiWhitelist;

// Re-export public API
pub use blocks::{dedup_blocks, BlockSplitter, ChromosomeBlock};
pub use counters::{format_duration, log_summary, Counters};
pub use engine::{ChromosomeState, Decision, DedupEngine, SortGuard};

/// Deduplicates a chromosome-sorted SAM stream into `writer`.
///
/// With `threads > 1` chromosomes are processed in parallel; output and
/// counters are identical to the sequential run.
pub fn dedup_stream<R: BufRead, W: Write + ?Sized>(
    reader: R,
    writer: &mut W,
    whitelist: &UmiWhitelist,
    threads: usize,
) -> Result<Counters> {
    if threads > 1 {
        dedup_blocks(reader, writer, whitelist, threads)
    } else {
        let mut engine = DedupEngine::new(whitelist);
        engine.run(reader, writer)?;
        Ok(engine.finish())
    }
}
