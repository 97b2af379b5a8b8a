//! Single-shot DEFLATE compress/decompress of a grain payload.
//!
//! Each grain is an independent DEFLATE stream (`spec.md` Design Notes,
//! "Compression lifecycle") — there is no shared dictionary or window
//! across grains, so `flate2`'s one-shot `DeflateEncoder`/`DeflateDecoder`
//! is sufficient; there is no long-lived encoder/decoder session to manage.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Compress `data` with DEFLATE at `level` (0-9, 6 is the conventional default).
pub fn compress_grain(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress exactly `uncompressed_size` bytes from `compressed`.
///
/// Fails unless the whole input is consumed and the whole output buffer is
/// filled — either condition failing indicates corruption
/// (`spec.md` §4.4 step 5, Design Notes "Compression lifecycle").
pub fn decompress_grain(compressed: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut out = vec![0u8; uncompressed_size];
    decoder.read_exact(&mut out).map_err(|e| {
        Error::corrupt_grain(format!(
            "inflate failed to fill {uncompressed_size} byte grain: {e}"
        ))
    })?;

    // Confirm the compressed stream doesn't carry trailing data we silently
    // dropped, and doesn't claim more output than we asked for.
    let mut trailing = [0u8; 1];
    match decoder.read(&mut trailing) {
        Ok(0) => Ok(out),
        Ok(_) => Err(Error::corrupt_grain(
            "inflate produced more output than the grain size",
        )),
        Err(e) => Err(Error::corrupt_grain(format!(
            "inflate stream not cleanly exhausted: {e}"
        ))),
    }
}
