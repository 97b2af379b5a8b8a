//! Stream-optimized VMDK production (`vmdktool.c`'s `raw2grain()`/
//! `allraw2grains()`).
//!
//! The header and descriptor are written exactly once, at the very end,
//! by seeking back to the start of the output (`spec.md` Design Notes,
//! "Single terminal seek-to-0 write") — by then the final capacity and
//! grain directory offset are known, so unlike the footer-chasing a
//! reader must support, this writer never actually emits the sentinel
//! `gdOffset`: it resolves the real value before any header bytes reach
//! disk, exactly as `allraw2grains()` does.
//!
//! `raw2grain()` streams its grain through zlib's chunked `deflate()` API
//! and backpatches the marker's 12-byte header afterward because it
//! doesn't know the compressed size up front. `deflate::compress_grain`
//! is one-shot and returns the whole buffer, so the size is already known
//! before the marker is written — no backpatch needed here.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::sector::{self, SECTOR_SIZE};
use crate::vmdk::deflate;
use crate::vmdk::descriptor;
use crate::vmdk::format::{GdOffset, Header, Marker, MarkerType};

/// Default filename recorded in the generated descriptor's extent line,
/// matching `vmdktool.c`'s own generated descriptor.
const GENERATED_EXTENT_FILENAME: &str = "generated-stream.vmdk";

/// Configuration for a raw → stream-optimized VMDK conversion.
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// Disk capacity in bytes. `None` means "however much `input` has" —
    /// the writer reads to EOF and reports the total back in the header.
    pub capacity_bytes: Option<u64>,
    /// DEFLATE compression level, 0 (none) through 9 (best), matching the
    /// `-z` flag's range.
    pub deflate_level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            capacity_bytes: None,
            deflate_level: 6,
        }
    }
}

/// Convert a raw disk image read from `input` into a stream-optimized
/// VMDK written to `output`, returning the final header (`spec.md` §4.6).
pub fn write_stream_optimized<R: Read, W: Write + Seek>(
    input: &mut R,
    output: &mut W,
    opts: WriterOptions,
    _diag: &mut Diagnostics,
) -> Result<Header> {
    let mut header = Header::new_stream_optimized_placeholder(1);
    output.seek(SeekFrom::Start(header.overhead * SECTOR_SIZE))?;

    let grain_bytes = header.grain_bytes() as usize;
    let mut read_total: u64 = 0;
    let mut grain_index: u64 = 0;
    let mut gt_entries: Vec<u32> = Vec::new();
    let mut gd_entries: Vec<u32> = Vec::new();

    loop {
        let capped = opts
            .capacity_bytes
            .is_some_and(|cap| read_total >= cap);

        let mut buf = vec![0u8; grain_bytes];
        let got = if capped {
            0
        } else {
            sector::read_zero_padded(input, &mut buf)?
        };

        if got > 0 {
            read_total += got as u64;
            let entry = write_one_grain(output, &header, grain_index, &buf, opts.deflate_level)?;
            gt_entries.push(entry);
            grain_index += 1;
        }

        if gt_entries.len() == header.num_gtes_per_gt as usize
            || (!gt_entries.is_empty() && got == 0)
        {
            let gd_entry = flush_grain_table(output, &header, &gt_entries)?;
            gd_entries.push(gd_entry);
            gt_entries.clear();
        }

        if got == 0 {
            break;
        }
    }

    let capacity_bytes = opts.capacity_bytes.unwrap_or(read_total);
    header.capacity = capacity_bytes / SECTOR_SIZE;

    let gd_offset = flush_grain_directory(output, &header, &gd_entries)?;
    header.gd_offset = GdOffset::Known(gd_offset);

    output.write_all(&Marker::meta(MarkerType::Footer, 1).to_bytes())?;
    output.write_all(&header.to_bytes())?;
    output.write_all(&Marker::meta(MarkerType::EndOfStream, 0).to_bytes())?;

    output.seek(SeekFrom::Start(0))?;
    output.write_all(&header.to_bytes())?;
    let descriptor = descriptor::render_descriptor(header.capacity, GENERATED_EXTENT_FILENAME);
    output.write_all(&descriptor)?;

    Ok(header)
}

/// Compress one grain and write its marker + payload at the output's
/// current position, returning the marker's sector (the grain table
/// entry) or 0 if the grain is entirely zero (a hole, no data written).
fn write_one_grain<W: Write + Seek>(
    output: &mut W,
    header: &Header,
    grain_index: u64,
    grain: &[u8],
    level: u32,
) -> Result<u32> {
    if grain.iter().all(|&b| b == 0) {
        return Ok(0);
    }

    let start = output.stream_position()?;
    let start_sector = start / SECTOR_SIZE;
    let compressed = deflate::compress_grain(grain, level)?;

    let val = grain_index * header.grain_size;
    output.write_all(&val.to_le_bytes())?;
    output.write_all(&(compressed.len() as u32).to_le_bytes())?;
    output.write_all(&compressed)?;

    let end = output.stream_position()?;
    let rounded = sector::round_up_to_sector(end);
    output.seek(SeekFrom::Start(rounded))?;

    Ok(start_sector as u32)
}

/// Write a full-size grain table (`numGTEsPerGT` entries, zero-padded
/// past `entries`) and return the sector its entries begin at — one past
/// its marker sector, matching `allraw2grains()`'s `ent = ... + 1`.
fn flush_grain_table<W: Write + Seek>(
    output: &mut W,
    header: &Header,
    entries: &[u32],
) -> Result<u32> {
    let marker_sector = output.stream_position()? / SECTOR_SIZE;
    let blocks = crate::vmdk::inspector::grain_table_blocks(header);
    let marker = Marker::meta(MarkerType::GrainTable, blocks);
    output.write_all(&marker.to_bytes())?;

    let mut buf = vec![0u8; (blocks * SECTOR_SIZE) as usize];
    for (i, &entry) in entries.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    output.write_all(&buf)?;

    Ok(marker_sector as u32 + 1)
}

/// Write the grain directory and return the sector its entries begin at.
///
/// The directory is always padded out to at least `header.num_grain_tables()`
/// entries (value 0 = grain table absent), even when fewer grain tables
/// were actually flushed — e.g. a `-c` capacity override larger than the
/// input actually supplied (`spec.md` §8, "Zero-length input on `-c`
/// override ... directory empty"). Sizing the on-disk directory from
/// `entries.len()` alone would leave it shorter than what `header.capacity`
/// promises, and a reader computing `dirblks` from the header would then
/// read past the directory into whatever bytes follow it on disk.
///
/// A final partial grain can also push the other way: when capacity isn't
/// overridden, `header.capacity` is truncated down to a whole number of
/// sectors from however many real bytes were read, which can floor
/// `num_grain_tables()` below the grain table actually flushed for that
/// tail data. The directory is sized to whichever of the two is larger so
/// a real entry is never dropped.
fn flush_grain_directory<W: Write + Seek>(
    output: &mut W,
    header: &Header,
    entries: &[u32],
) -> Result<u64> {
    let marker_sector = output.stream_position()? / SECTOR_SIZE;
    let from_header = crate::vmdk::inspector::dir_blocks(header);
    let from_entries = sector::bytes_to_sectors_ceil(entries.len() as u64 * 4);
    let blocks = from_header.max(from_entries);
    let marker = Marker::meta(MarkerType::GrainDirectory, blocks);
    output.write_all(&marker.to_bytes())?;

    let mut buf = vec![0u8; (blocks * SECTOR_SIZE) as usize];
    for (i, &entry) in entries.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
    }
    output.write_all(&buf)?;

    Ok(marker_sector + 1)
}
