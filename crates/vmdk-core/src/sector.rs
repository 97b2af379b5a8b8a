//! Byte I/O and sector arithmetic shared by every VMDK component.
//!
//! A sector is a fixed 512-byte unit; every on-disk offset the format
//! describes is sector-scaled unless stated otherwise. The helpers here
//! perform positioned reads/writes against a generic seekable source or
//! sink, so the engine never assumes the whole file fits in memory.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;

/// Size of a sector in bytes.
pub const SECTOR_SIZE: u64 = 512;

/// Round a byte count up to the next whole number of sectors, returned in sectors.
pub fn bytes_to_sectors_ceil(bytes: u64) -> u64 {
    (bytes + SECTOR_SIZE - 1) / SECTOR_SIZE
}

/// Round a byte count up to the next sector boundary, returned in bytes.
pub fn round_up_to_sector(bytes: u64) -> u64 {
    bytes_to_sectors_ceil(bytes) * SECTOR_SIZE
}

/// Seek to `offset` bytes from the start and read exactly `buf.len()` bytes,
/// zero-filling any shortfall (the only tolerated short-read case per the
/// writer's final grain, `spec.md` §7).
pub fn read_at_zero_padded<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<usize> {
    reader.seek(SeekFrom::Start(offset))?;
    read_zero_padded(reader, buf)
}

/// Read from the current position, zero-filling any shortfall, and return
/// how many real (non-padding) bytes were read.
pub fn read_zero_padded<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut got = 0usize;
    while got < buf.len() {
        match reader.read(&mut buf[got..])? {
            0 => break,
            n => got += n,
        }
    }
    if got < buf.len() {
        for b in &mut buf[got..] {
            *b = 0;
        }
    }
    Ok(got)
}

/// Seek to `offset` bytes from the start and read exactly `buf.len()` bytes,
/// failing if the source is short.
pub fn read_exact_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)?;
    Ok(())
}

/// Seek to `offset` bytes from the start and write the whole buffer there.
pub fn write_at<W: Write + Seek>(writer: &mut W, offset: u64, buf: &[u8]) -> Result<()> {
    writer.seek(SeekFrom::Start(offset))?;
    writer.write_all(buf)?;
    Ok(())
}

/// After a vmdk→raw operation, the output must be exactly `capacity_bytes`
/// long (`spec.md` §4.7). If the sink is already exactly that length this is
/// a no-op; otherwise a single NUL byte is written at the last offset and
/// the sink truncated to size, matching `vmdktool.c`'s `setsize()`.
pub fn set_output_size(file: &std::fs::File, capacity_bytes: u64) -> Result<()> {
    let current = file.metadata()?.len();
    if current != capacity_bytes {
        if capacity_bytes > 0 {
            file.set_len(capacity_bytes)?;
        } else {
            file.set_len(0)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sector_rounding() {
        assert_eq!(bytes_to_sectors_ceil(0), 0);
        assert_eq!(bytes_to_sectors_ceil(1), 1);
        assert_eq!(bytes_to_sectors_ceil(512), 1);
        assert_eq!(bytes_to_sectors_ceil(513), 2);
        assert_eq!(round_up_to_sector(513), 1024);
    }

    #[test]
    fn test_read_zero_padded_fills_short_read() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        let got = read_zero_padded(&mut src, &mut buf).unwrap();
        assert_eq!(got, 3);
        assert_eq!(&buf, &[1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_read_at_zero_padded_seeks_first() {
        let mut src = Cursor::new(vec![9u8, 9, 1, 2, 3]);
        let mut buf = [0u8; 4];
        let got = read_at_zero_padded(&mut src, 2, &mut buf).unwrap();
        assert_eq!(got, 3);
        assert_eq!(&buf, &[1, 2, 3, 0]);
    }

    #[test]
    fn test_write_at_seeks_first() {
        let mut sink = Cursor::new(vec![0u8; 8]);
        write_at(&mut sink, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(sink.into_inner(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    }
}
