//! Borrowed view over one tab-delimited SAM line.

use crate::cigar::{five_prime_signature, Signature, Strand};
use crate::errors::{DedupError, Result};

/// Minimum number of tab-separated fields of an alignment line
pub const MIN_FIELDS: usize = 6;

/// Largest POS value allowed by the SAM format (2^31 - 1)
pub const MAX_POSITION: i64 = i32::MAX as i64;

/// Whether a line belongs to the SAM header.
#[must_use]
pub fn is_header(line: &str) -> bool {
    line.starts_with('@')
}

/// The UMI is the text after the last `:` of the read name.
#[must_use]
pub fn umi_from_qname(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// The fields of an alignment line used for deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentRecord<'a> {
    pub qname: &'a str,
    pub flag: u16,
    pub chrom: &'a str,
    /// 1-based leftmost mapping position
    pub pos: i64,
    pub cigar: &'a str,
}

impl<'a> AlignmentRecord<'a> {
    /// Parses a data line. Header lines are not alignment records.
    pub fn parse(line: &'a str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').take(MIN_FIELDS).collect();
        if fields.len() < MIN_FIELDS {
            return Err(DedupError::MalformedRecord {
                reason: format!(
                    "expected at least {} tab-separated fields, found {}",
                    MIN_FIELDS,
                    fields.len()
                ),
            });
        }

        let flag: u16 = fields[1].parse().map_err(|_| DedupError::MalformedRecord {
            reason: format!("invalid bitwise flag '{}'", fields[1]),
        })?;
        let pos: i64 = fields[3]
            .parse()
            .ok()
            .filter(|pos| (0..=MAX_POSITION).contains(pos))
            .ok_or_else(|| DedupError::MalformedRecord {
                reason: format!(
                    "invalid leftmost position '{}' (expected 0..={})",
                    fields[3], MAX_POSITION
                ),
            })?;

        Ok(Self { qname: fields[0], flag, chrom: fields[2], pos, cigar: fields[5] })
    }

    #[must_use]
    pub fn umi(&self) -> &'a str {
        umi_from_qname(self.qname)
    }

    #[must_use]
    pub fn strand(&self) -> Strand {
        Strand::from_flag(self.flag)
    }

    /// 5' position and strand of the read.
    pub fn signature(&self) -> Result<Signature> {
        five_prime_signature(self.cigar, self.pos, self.strand())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "NS500451:154:HWKTMBGXX:1:11101:24260:1121:CTGTTCAC\t0\t2\t76814284\t36\t71M\t*\t0\t0\tTCCACCACAATC\t6AEEEEEEAEEA\tMD:Z:71\tNH:i:1";

    #[test]
    fn test_parse_record() {
        let record = AlignmentRecord::parse(LINE).unwrap();
        assert_eq!(record.umi(), "CTGTTCAC");
        assert_eq!(record.flag, 0);
        assert_eq!(record.chrom, "2");
        assert_eq!(record.pos, 76_814_284);
        assert_eq!(record.cigar, "71M");
        assert_eq!(record.strand(), Strand::Forward);
        assert_eq!(
            record.signature().unwrap(),
            Signature { five_prime: 76_814_284, strand: Strand::Forward }
        );
    }

    #[test]
    fn test_reverse_record() {
        let record = AlignmentRecord::parse("r1:AACGT\t16\tchr1\t1\t60\t5M2S").unwrap();
        assert_eq!(record.strand(), Strand::Reverse);
        assert_eq!(record.signature().unwrap().five_prime, 7);
    }

    #[test]
    fn test_umi_without_colon() {
        assert_eq!(umi_from_qname("AACGT"), "AACGT");
        assert_eq!(umi_from_qname("read:"), "");
        assert_eq!(umi_from_qname("a:b:c:GGCC"), "GGCC");
    }

    #[test]
    fn test_header_detection() {
        assert!(is_header("@HD\tVN:1.6\tSO:coordinate"));
        assert!(is_header("@SQ\tSN:chr1\tLN:248956422"));
        assert!(!is_header("read:AACGT\t0\tchr1\t1\t60\t5M"));
    }

    #[test]
    fn test_too_few_fields() {
        let err = AlignmentRecord::parse("r1:AACGT\t0\tchr1\t100").unwrap_err();
        assert!(matches!(err, DedupError::MalformedRecord { ref reason } if reason.contains("found 4")));
    }

    #[test]
    fn test_bad_numbers() {
        assert!(matches!(
            AlignmentRecord::parse("r1:AACGT\tzero\tchr1\t100\t60\t5M"),
            Err(DedupError::MalformedRecord { .. })
        ));
        assert!(matches!(
            AlignmentRecord::parse("r1:AACGT\t0\tchr1\tfirst\t60\t5M"),
            Err(DedupError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_position_out_of_sam_range() {
        for pos in ["9223372036854775807", "2147483648", "-1"] {
            let line = format!("r1:AACGT\t16\tchr1\t{pos}\t60\t10M");
            let err = AlignmentRecord::parse(&line).unwrap_err();
            assert!(
                matches!(err, DedupError::MalformedRecord { ref reason } if reason.contains(pos)),
                "{pos}: {err}"
            );
        }
    }

    #[test]
    fn test_largest_position_on_reverse_strand() {
        let line = format!("r1:AACGT\t16\tchr1\t{MAX_POSITION}\t60\t10M2S");
        let record = AlignmentRecord::parse(&line).unwrap();
        assert_eq!(record.signature().unwrap().five_prime, MAX_POSITION + 11);
    }
}
