//! Removal of PCR duplicates from chromosome-sorted, single-end SAM files.
//!
//! Two records are duplicates when they share a whitelisted UMI (the last
//! `:`-separated component of the read name), the strand and the 5' position
//! reconstructed from the CIGAR, on the same chromosome.

pub mod cigar;
pub mod dedup;
pub mod errors;
pub mod io;
pub mod record;
pub mod umi;

pub use cigar::{Signature, Strand};
pub use dedup::{dedup_stream, Counters, Decision, DedupEngine};
pub use errors::{DedupError, Result};
pub use umi::UmiWhitelist;
