//! Unique Vaccination Certificate Identifier classification
//!
//! A UVCI is a two character prefix, a numeric body and a trailing ICAO 9303
//! check digit. The numeric body places the certificate in the test,
//! specimen or production range.

use tracing::debug;

use crate::pki::{VerifyError, VerifyResult};

/// Highest body value reserved for test certificates
const TEST_LIMIT: i32 = 998_999;
/// Highest body value reserved for specimen certificates
const SPECIMEN_LIMIT: i32 = 999_999;

/// ICAO 9303 check digit weights, applied cyclically
const WEIGHTS: [u32; 3] = [7, 3, 1];

/// Range an identifier falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UvciRange {
    Invalid,
    Test,
    Specimen,
    Production,
}

/// Validates and classifies UVCIs
#[derive(Debug, Default, Clone, Copy)]
pub struct UvciChecker;

impl UvciChecker {
    /// Classify an identifier.
    ///
    /// Structural problems (too short, bad check digit, letters in the body)
    /// yield [`UvciRange::Invalid`]. A body that passes those checks but
    /// does not parse as an integer is reported as
    /// [`VerifyError::IdentifierParse`].
    pub fn check_range(value: &str) -> VerifyResult<UvciRange> {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() < 4 {
            return Ok(UvciRange::Invalid);
        }

        let (checked, check) = chars.split_at(chars.len() - 1);
        let expected = check[0].to_digit(10);
        if expected.is_none() || check_digit(checked.iter().copied()) != expected {
            debug!(uvci = value, "UVCI check digit mismatch");
            return Ok(UvciRange::Invalid);
        }

        let body = &checked[2..];
        if body.iter().any(|c| c.is_alphabetic()) {
            return Ok(UvciRange::Invalid);
        }

        let body: String = body.iter().collect();
        // bodies are 32-bit signed integers in issued identifiers
        let number: i32 = body.parse().map_err(|_| VerifyError::IdentifierParse)?;

        Ok(match number {
            n if n <= TEST_LIMIT => UvciRange::Test,
            n if n <= SPECIMEN_LIMIT => UvciRange::Specimen,
            _ => UvciRange::Production,
        })
    }
}

/// Value of a character in the check digit calculation
fn character_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        'A'..='Z' | 'a'..='z' => Some(c.to_ascii_uppercase() as u32 - 'A' as u32 + 10),
        '<' => Some(0),
        _ => None,
    }
}

/// ICAO 9303 check digit of `data`, or `None` if a character has no value
fn check_digit(data: impl IntoIterator<Item = char>) -> Option<u32> {
    let mut sum = 0;
    for (i, c) in data.into_iter().enumerate() {
        sum = (sum + character_value(c)? * WEIGHTS[i % WEIGHTS.len()]) % 10;
    }
    Some(sum)
}
