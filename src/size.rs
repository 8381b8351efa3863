//! Human-readable size strings.

use crate::error::{Error, Result};

/// Parse a size such as `"400KB"`, `"500mb"` or `"1g"` into a byte count.
///
/// Units are binary (`K` = 1024) and case-insensitive; `B`, `KB` and `KIB`
/// are all accepted for each rank up to exabytes. An empty string parses as
/// `0`, as does any magnitude `<= 0`. An unrecognised unit suffix is ignored
/// and the magnitude is taken as bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidSize`] when the magnitude is not an integer or the
/// result does not fit in a `u64`.
///
/// # Examples
///
/// ```
/// use logrotate::parse_size;
///
/// assert_eq!(parse_size("400KB").unwrap(), 409_600);
/// assert_eq!(parse_size(" 1g ").unwrap(), 1 << 30);
/// assert_eq!(parse_size("").unwrap(), 0);
/// assert_eq!(parse_size("-5").unwrap(), 0);
/// ```
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_ascii_uppercase();
    if s.is_empty() {
        return Ok(0);
    }

    let (magnitude, unit) = match s.find(|c: char| c.is_alphabetic()) {
        Some(i) => s.split_at(i),
        None => (s.as_str(), ""),
    };

    let magnitude: i64 = magnitude
        .parse()
        .map_err(|_| Error::InvalidSize(s.clone()))?;
    if magnitude <= 0 {
        return Ok(0);
    }

    (magnitude as u64)
        .checked_mul(multiplier(unit))
        .ok_or(Error::InvalidSize(s))
}

fn multiplier(unit: &str) -> u64 {
    let rank = match unit {
        "K" | "KB" | "KIB" => 1,
        "M" | "MB" | "MIB" => 2,
        "G" | "GB" | "GIB" => 3,
        "T" | "TB" | "TIB" => 4,
        "P" | "PB" | "PIB" => 5,
        "E" | "EB" | "EIB" => 6,
        // "B" and anything unrecognised count as plain bytes
        _ => 0,
    };
    1u64 << (10 * rank)
}
