//! Error types for deduplication runs.

use thiserror::Error;

/// Result type alias for deduper operations
pub type Result<T> = std::result::Result<T, DedupError>;

/// Fatal conditions that abort a deduplication run.
///
/// A record whose UMI is not whitelisted is not an error; it is counted and dropped.
#[derive(Error, Debug)]
pub enum DedupError {
    /// A CIGAR token does not match `<digits><M|I|D|N|S>`
    #[error("Malformed CIGAR '{cigar}': invalid token '{token}'")]
    MalformedCigar {
        /// The full CIGAR string
        cigar: String,
        /// The offending token (or remainder of the string)
        token: String,
    },

    /// The reconstructed 5' coordinate fell below zero
    #[error("Negative 5' position {position} computed from CIGAR '{cigar}' at leftmost position {leftmost}")]
    NegativePosition {
        /// The CIGAR string
        cigar: String,
        /// 1-based leftmost mapping position of the record
        leftmost: i64,
        /// The computed position
        position: i64,
    },

    /// A data line that cannot be read as an alignment record
    #[error("Malformed alignment record: {reason}")]
    MalformedRecord {
        /// What is wrong with the record
        reason: String,
    },

    /// A chromosome reappeared after the input had moved past it
    #[error("Input is not sorted by chromosome: '{chrom}' reappears after other chromosomes")]
    UnsortedInput {
        /// The chromosome seen again
        chrom: String,
    },

    /// Error raised while processing a specific input line
    #[error("Line {line}: {source}\n\t{record}")]
    AtLine {
        /// 1-based line number in the input
        line: u64,
        /// The offending line
        record: String,
        /// The underlying error
        #[source]
        source: Box<DedupError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DedupError {
    /// Attaches the input line number and text to an error.
    #[must_use]
    pub fn at_line(self, line: u64, record: &str) -> Self {
        DedupError::AtLine { line, record: record.to_string(), source: Box::new(self) }
    }

    /// Returns the innermost error, skipping line context.
    #[must_use]
    pub fn root(&self) -> &DedupError {
        match self {
            DedupError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }
}
