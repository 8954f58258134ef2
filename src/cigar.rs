//! CIGAR tokenizing and 5' position reconstruction.
//!
//! The 5' position is the reference coordinate where the sequenced fragment
//! starts, in the orientation of the read. It is invariant under soft-clipping,
//! which makes it the anchor for duplicate detection: two reads from the same
//! molecule share it even when their alignments were clipped differently.

use std::fmt;
use std::str::FromStr;

use crate::errors::{DedupError, Result};

/// SAM flag bit marking a reverse-complemented read
pub const REVERSE_FLAG: u16 = 0x10;

/// CIGAR operations understood by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
}

impl CigarOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'M' => Some(CigarOp::Match),
            'I' => Some(CigarOp::Insertion),
            'D' => Some(CigarOp::Deletion),
            'N' => Some(CigarOp::Skip),
            'S' => Some(CigarOp::SoftClip),
            _ => None,
        }
    }

    /// Whether the operation takes part in 5' position arithmetic.
    /// Insertions consume read bases only and are position-neutral.
    #[must_use]
    pub fn affects_position(self) -> bool {
        !matches!(self, CigarOp::Insertion)
    }

    fn as_char(self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
            CigarOp::Skip => 'N',
            CigarOp::SoftClip => 'S',
        }
    }
}

/// One `(length, operation)` element of a CIGAR string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarToken {
    pub len: u32,
    pub op: CigarOp,
}

impl fmt::Display for CigarToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.op.as_char())
    }
}

/// Parses a single `<digits><op>` token such as `71M` or `2S`.
///
/// The length must be a positive integer and the operation one of `M I D N S`.
pub fn parse_token(token: &str) -> Result<CigarToken> {
    let malformed =
        || DedupError::MalformedCigar { cigar: token.to_string(), token: token.to_string() };

    let mut chars = token.chars();
    let op_char = chars.next_back().ok_or_else(malformed)?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let op = CigarOp::from_char(op_char).ok_or_else(malformed)?;
    let len: u32 = digits.parse().map_err(|_| malformed())?;
    if len == 0 {
        return Err(malformed());
    }

    Ok(CigarToken { len, op })
}

/// An ordered, validated sequence of CIGAR tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cigar(Vec<CigarToken>);

impl Cigar {
    #[must_use]
    pub fn tokens(&self) -> &[CigarToken] {
        &self.0
    }
}

impl FromStr for Cigar {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self> {
        parse_cigar(s)
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|token| write!(f, "{token}"))
    }
}

/// Tokenizes a whole CIGAR string.
///
/// Fails on an empty or unavailable (`*`) CIGAR, on unsupported operations
/// (`H`, `P`, `=`, `X`) and on digits left without an operation.
pub fn parse_cigar(cigar: &str) -> Result<Cigar> {
    if cigar.is_empty() || cigar == "*" {
        return Err(DedupError::MalformedCigar { cigar: cigar.to_string(), token: cigar.to_string() });
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in cigar.char_indices() {
        if c.is_ascii_digit() {
            continue;
        }
        let end = i + c.len_utf8();
        let token = parse_token(&cigar[start..end]).map_err(|_| DedupError::MalformedCigar {
            cigar: cigar.to_string(),
            token: cigar[start..end].to_string(),
        })?;
        tokens.push(token);
        start = end;
    }

    if start < cigar.len() {
        // Trailing length with no operation.
        return Err(DedupError::MalformedCigar {
            cigar: cigar.to_string(),
            token: cigar[start..].to_string(),
        });
    }

    Ok(Cigar(tokens))
}

/// Read orientation relative to the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    /// Derives the strand from a SAM bitwise flag.
    #[must_use]
    pub fn from_flag(flag: u16) -> Self {
        if flag & REVERSE_FLAG == REVERSE_FLAG {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
        })
    }
}

/// Deduplication key paired with the UMI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pub five_prime: i64,
    pub strand: Strand,
}

/// Computes the 5' reference coordinate of a read.
///
/// Forward reads start at `leftmost`, moved upstream by a leading soft-clip.
/// Reverse reads start at the last reference base covered: every M/D/N adds
/// its length, a leading soft-clip (the 3' end) is skipped and any later
/// soft-clip extends the read. Soft-clips in the middle of a CIGAR are
/// treated like the trailing one.
#[must_use]
pub fn compute_five_prime_position(tokens: &[CigarToken], leftmost: i64, strand: Strand) -> i64 {
    let mut retained = tokens.iter().filter(|t| t.op.affects_position());

    match strand {
        Strand::Forward => match retained.next() {
            Some(first) if first.op == CigarOp::SoftClip => leftmost - i64::from(first.len),
            _ => leftmost,
        },
        Strand::Reverse => {
            let mut pos = leftmost;
            for (i, token) in retained.enumerate() {
                if i == 0 && token.op == CigarOp::SoftClip {
                    continue;
                }
                pos += i64::from(token.len);
            }
            // One past the end -> last covered base
            pos - 1
        }
    }
}

/// Tokenizes `cigar` and returns the record's signature.
///
/// A negative 5' position means the CIGAR and position cannot both be right.
pub fn five_prime_signature(cigar: &str, leftmost: i64, strand: Strand) -> Result<Signature> {
    let parsed = parse_cigar(cigar)?;
    let five_prime = compute_five_prime_position(parsed.tokens(), leftmost, strand);
    if five_prime < 0 {
        return Err(DedupError::NegativePosition {
            cigar: cigar.to_string(),
            leftmost,
            position: five_prime,
        });
    }
    Ok(Signature { five_prime, strand })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn five_prime(strand: &str, cigar: &str, leftmost: i64) -> i64 {
        let strand = match strand {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            other => panic!("bad strand in test case: {other}"),
        };
        let cigar: Cigar = cigar.parse().unwrap();
        compute_five_prime_position(cigar.tokens(), leftmost, strand)
    }

    #[rstest]
    #[case("+", "71M", 76_814_284, 76_814_284)]
    #[case("-", "7M", 1, 7)]
    #[case("+", "2M1D2M1I2M", 1, 1)]
    #[case("-", "5M2S", 1, 7)]
    #[case("-", "2S2M3S", 3, 7)]
    #[case("+", "3S10M", 100, 97)]
    #[case("+", "3S10M4S", 100, 97)]
    #[case("+", "10M100N20M", 50, 50)]
    #[case("-", "10M100N20M", 50, 179)]
    #[case("-", "4M2D4M", 10, 19)]
    #[case("-", "4M3I4M", 10, 17)]
    #[case("-", "5S10M", 20, 29)]
    fn test_five_prime_position(
        #[case] strand: &str,
        #[case] cigar: &str,
        #[case] leftmost: i64,
        #[case] expected: i64,
    ) {
        assert_eq!(five_prime(strand, cigar, leftmost), expected);
    }

    #[test]
    fn test_forward_without_leading_clip_is_leftmost() {
        for cigar in ["1M", "50M", "3M2D4M", "10M5N10M", "20M7S", "2M1D2M1I2M"] {
            for leftmost in [1, 17, 1_000_000] {
                assert_eq!(five_prime("+", cigar, leftmost), leftmost, "{cigar}");
            }
        }
    }

    #[test]
    fn test_forward_leading_clip_subtracts_length() {
        for clip in [1u32, 5, 30] {
            let cigar = format!("{clip}S40M");
            assert_eq!(five_prime("+", &cigar, 500), 500 - i64::from(clip));
        }
    }

    #[test]
    fn test_insertion_before_clip_is_ignored() {
        // The insertion is dropped before looking at the first token.
        assert_eq!(five_prime("+", "2I3S10M", 100), 97);
    }

    #[test]
    fn test_reverse_mid_sequence_softclip_adds_length() {
        // 2S is neither first nor last, so it extends like M.
        assert_eq!(five_prime("-", "5M2S5M", 1), 12);
    }

    #[test]
    fn test_only_insertions() {
        assert_eq!(five_prime("+", "5I", 10), 10);
        assert_eq!(five_prime("-", "5I", 10), 9);
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(parse_token("71M").unwrap(), CigarToken { len: 71, op: CigarOp::Match });
        assert_eq!(parse_token("2S").unwrap(), CigarToken { len: 2, op: CigarOp::SoftClip });
        assert_eq!(parse_token("1I").unwrap(), CigarToken { len: 1, op: CigarOp::Insertion });
        assert_eq!(parse_token("12N").unwrap(), CigarToken { len: 12, op: CigarOp::Skip });
    }

    #[rstest]
    #[case("")]
    #[case("M")]
    #[case("5")]
    #[case("5H")]
    #[case("5=")]
    #[case("0M")]
    #[case("5MM")]
    #[case("-5M")]
    #[case("99999999999M")]
    fn test_parse_token_rejects(#[case] token: &str) {
        assert!(matches!(parse_token(token), Err(DedupError::MalformedCigar { .. })));
    }

    #[rstest]
    #[case("", "")]
    #[case("*", "*")]
    #[case("5M3", "3")]
    #[case("5M3H", "3H")]
    #[case("2S5M1I3=5X2M1S", "3=")]
    #[case("M5", "M")]
    #[case("5Mé", "é")]
    fn test_parse_cigar_reports_offending_token(#[case] cigar: &str, #[case] bad: &str) {
        match parse_cigar(cigar) {
            Err(DedupError::MalformedCigar { cigar: c, token }) => {
                assert_eq!(c, cigar);
                assert_eq!(token, bad);
            }
            other => panic!("expected MalformedCigar, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_cigar_keeps_insertions() {
        let cigar = parse_cigar("2M1D2M1I2M").unwrap();
        assert_eq!(cigar.tokens().len(), 5);
        assert_eq!(cigar.tokens()[3].op, CigarOp::Insertion);
        assert_eq!(cigar.to_string(), "2M1D2M1I2M");
    }

    #[test]
    fn test_strand_from_flag() {
        assert_eq!(Strand::from_flag(0), Strand::Forward);
        assert_eq!(Strand::from_flag(16), Strand::Reverse);
        assert_eq!(Strand::from_flag(16 | 256), Strand::Reverse);
        assert_eq!(Strand::from_flag(4 | 1024), Strand::Forward);
    }

    #[test]
    fn test_signature_negative_position() {
        let err = five_prime_signature("10S5M", 3, Strand::Forward).unwrap_err();
        assert!(matches!(err, DedupError::NegativePosition { position: -7, leftmost: 3, .. }));
        // Zero is still a valid coordinate.
        let sig = five_prime_signature("3S5M", 3, Strand::Forward).unwrap();
        assert_eq!(sig, Signature { five_prime: 0, strand: Strand::Forward });
    }

    #[test]
    fn test_signature_carries_strand() {
        let sig = five_prime_signature("5M2S", 1, Strand::Reverse).unwrap();
        assert_eq!(sig, Signature { five_prime: 7, strand: Strand::Reverse });
    }
}
