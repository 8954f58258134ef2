use std::fmt;
use std::ops::AddAssign;
use std::time::Duration;

use log::info;

/// Running totals of a deduplication run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub headers: u64,
    pub invalid_umis: u64,
    pub unique: u64,
    pub duplicates: u64,
}

impl Counters {
    /// Data records seen with a whitelisted UMI.
    #[must_use]
    pub fn valid_records(&self) -> u64 {
        self.unique + self.duplicates
    }

    /// Fraction of whitelisted records that were duplicates (0.0 when none were seen).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duplicate_fraction(&self) -> f64 {
        match self.valid_records() {
            0 => 0.0,
            n => self.duplicates as f64 / n as f64,
        }
    }
}

impl AddAssign for Counters {
    fn add_assign(&mut self, other: Self) {
        self.headers += other.headers;
        self.invalid_umis += other.invalid_umis;
        self.unique += other.unique;
        self.duplicates += other.duplicates;
    }
}

/// The termination report shown to the operator.
impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of header lines: {}", self.headers)?;
        writeln!(f, "Number of wrong UMIs: {}", self.invalid_umis)?;
        writeln!(f, "Number of unique reads: {}", self.unique)?;
        writeln!(f, "Number of duplicates: {}", self.duplicates)
    }
}

/// Formats a duration as "45s", "2m 15s" or "1h 30m".
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Logs a one-line summary of the run at info level.
pub fn log_summary(counters: &Counters, elapsed: Duration) {
    info!(
        "Kept {} unique reads, removed {} duplicates ({:.2}%), dropped {} reads with unknown UMIs in {}",
        counters.unique,
        counters.duplicates,
        counters.duplicate_fraction() * 100.0,
        counters.invalid_umis,
        format_duration(elapsed)
    );
}
