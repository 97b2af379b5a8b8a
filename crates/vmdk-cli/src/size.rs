//! Size-string parsing for the `-c`/`--capacity` override.
//!
//! `vmdktool`'s `-c` flag is handed to `expand_number(3)`, a BSD utility
//! that accepts a plain byte count or a count suffixed with a
//! power-of-1024 unit (`k`/`m`/`g`/`t`) or the letter `s` for a sector
//! count. This is deliberately outside `vmdk-core` (`spec.md` §1 treats
//! size-string parsing of capacity arguments as the caller's job) — the
//! core only ever deals in already-resolved byte counts.

use anyhow::{anyhow, Result};

const SECTOR_SIZE: u64 = 512;

/// Parse a capacity string into a byte count.
///
/// Accepts a bare decimal number (bytes), or a number followed by one of
/// `b`/`k`/`m`/`g`/`t` (case-insensitive, powers of 1024), or `s` for a
/// count of 512-byte sectors.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty size string"));
    }

    let (digits, suffix) = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => (&trimmed[..idx], Some(&trimmed[idx..])),
        None => (trimmed, None),
    };
    if digits.is_empty() {
        return Err(anyhow!("'{input}' has no leading digits"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| anyhow!("'{input}' is not a valid size"))?;

    let multiplier = match suffix {
        None => 1,
        Some(s) if s.eq_ignore_ascii_case("b") => 1,
        Some(s) if s.eq_ignore_ascii_case("s") => SECTOR_SIZE,
        Some(s) if s.eq_ignore_ascii_case("k") => 1024,
        Some(s) if s.eq_ignore_ascii_case("m") => 1024 * 1024,
        Some(s) if s.eq_ignore_ascii_case("g") => 1024 * 1024 * 1024,
        Some(s) if s.eq_ignore_ascii_case("t") => 1024 * 1024 * 1024 * 1024,
        Some(s) => return Err(anyhow!("'{input}' has an unrecognized suffix '{s}'")),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("'{input}' overflows a 64-bit byte count"))
}
