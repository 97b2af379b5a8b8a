//! Header/descriptor inspection and raw table dumps (`vmdktool.c`'s
//! `vmdkinfo()` and `vmdkshowtable()`).
//!
//! Inspection never mutates its input and never trusts a single read as
//! the whole truth: the newline-detect bytes are checked but a mismatch
//! is only ever a [`Warning`](crate::diagnostics::Warning), and a sentinel
//! `gdOffset` is chased into the footer only when the caller asks for it.

use std::io::{Read, Seek, SeekFrom};

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::sector::{self, SECTOR_SIZE};
use crate::vmdk::descriptor;
use crate::vmdk::format::{GdOffset, Header, Marker, MarkerType};

/// Result of inspecting a header: the decoded header plus the pieces of
/// context that live outside its on-disk form.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub header: Header,
    /// Raw descriptor text (trimmed of trailing NUL padding).
    pub descriptor_text: String,
    /// Whether the descriptor declares `createType="streamOptimized"`.
    pub stream_optimized: bool,
}

/// Controls whether [`inspect`] is allowed to chase a sentinel `gdOffset`
/// into the footer, which requires knowing the total input length.
#[derive(Debug, Clone, Copy)]
pub struct InspectOptions {
    pub allow_footer_search: bool,
    pub input_len: u64,
}

/// Read the header at the reader's current position, check it, read its
/// descriptor, and — if asked — resolve a sentinel `gdOffset` by locating
/// the footer near the end of the stream (`spec.md` §4.2).
pub fn inspect<R: Read + Seek>(
    reader: &mut R,
    diag: &mut Diagnostics,
    opts: InspectOptions,
) -> Result<Inspection> {
    let mut buf = [0u8; SECTOR_SIZE as usize];
    reader.read_exact(&mut buf)?;
    let mut header = Header::from_bytes(&buf);

    if header.magic != crate::vmdk::format::VMDK_MAGIC {
        return Err(Error::BadMagic { found: header.magic });
    }

    if header.newline_detect_valid() {
        check_newline_byte(diag, "singleEndLineChar", b'\n', header.single_end_line_char);
        check_newline_byte(diag, "nonEndLineChar", b' ', header.non_end_line_char);
        check_newline_byte(diag, "doubleEndLineChar1", b'\r', header.double_end_line_char1);
        check_newline_byte(diag, "doubleEndLineChar2", b'\n', header.double_end_line_char2);
    }

    let mut descriptor_bytes = vec![0u8; (header.descriptor_size * SECTOR_SIZE) as usize];
    sector::read_at_zero_padded(
        reader,
        header.descriptor_offset * SECTOR_SIZE,
        &mut descriptor_bytes,
    )?;
    let descriptor_text = String::from_utf8_lossy(&descriptor_bytes)
        .trim_end_matches('\0')
        .to_string();
    let stream_optimized = descriptor::is_stream_optimized(&descriptor_text);

    if header.gd_offset == GdOffset::InFooter && opts.allow_footer_search {
        let footer = find_footer(reader, opts.input_len)?;
        header.gd_offset = footer.gd_offset;
        header.capacity = footer.capacity;
    }

    Ok(Inspection {
        header,
        descriptor_text,
        stream_optimized,
    })
}

fn check_newline_byte(diag: &mut Diagnostics, field: &'static str, expected: u8, found: u8) {
    if found != expected {
        diag.warn(Warning::NewlineCheckFailed {
            field,
            expected,
            found,
        });
    }
}

/// Locate and decode the footer header copy near the end of the stream.
///
/// The footer marker sits three sectors before end of file: one sector for
/// the marker itself, one for the footer's copy of the header, one for the
/// trailing end-of-stream marker (`vmdktool.c`'s footer-search arithmetic).
fn find_footer<R: Read + Seek>(reader: &mut R, input_len: u64) -> Result<Header> {
    let trailer_bytes = 2 * SECTOR_SIZE + SECTOR_SIZE;
    if input_len < trailer_bytes {
        return Err(Error::FileTooSmall {
            needed: trailer_bytes,
            got: input_len,
        });
    }
    let footer_marker_offset = input_len - trailer_bytes;
    let footer_sector = footer_marker_offset / SECTOR_SIZE;

    reader.seek(SeekFrom::Start(footer_marker_offset))?;
    let mut marker_buf = [0u8; SECTOR_SIZE as usize];
    reader.read_exact(&mut marker_buf)?;
    let marker = Marker::from_bytes(&marker_buf);

    if marker.is_grain() || marker.marker_type() != Some(MarkerType::Footer) {
        return Err(Error::BadFooter {
            sector: footer_sector,
        });
    }

    let mut header_buf = [0u8; SECTOR_SIZE as usize];
    reader.read_exact(&mut header_buf)?;
    let footer_header = Header::from_bytes(&header_buf);
    if footer_header.magic != crate::vmdk::format::VMDK_MAGIC {
        return Err(Error::BadFooter {
            sector: footer_sector + 1,
        });
    }
    Ok(footer_header)
}

/// Which table [`dump_table`] should read: a grain table (entries are
/// grain sector offsets) or the grain directory (entries are grain table
/// sector offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    GrainTable,
    GrainDirectory,
}

/// Number of sectors the grain directory occupies: one `u32` entry per
/// grain table, rounded up to a whole sector.
///
/// `vmdktool.c`'s `dirblks()` derives this by taking the remainder of an
/// intermediate division against `numGTEsPerGT`, which only happens to
/// produce the right answer because a grain table's reach
/// (`numGTEsPerGT` grains) is independent of the directory's own entry
/// size. Computed directly here as a plain ceiling division of
/// `numGrainTables * 4` bytes into sectors — anything else would
/// disagree with what the writer actually lays out on disk.
pub fn dir_blocks(header: &Header) -> u64 {
    let entry_bytes = header.num_grain_tables() * 4;
    sector::bytes_to_sectors_ceil(entry_bytes)
}

/// Number of sectors one grain table occupies.
pub fn grain_table_blocks(header: &Header) -> u64 {
    sector::bytes_to_sectors_ceil(header.num_gtes_per_gt as u64 * 4)
}

/// Read and decode a grain table or grain directory starting at
/// `start_sector`, returning its raw `u32` sector-offset entries in order
/// (`spec.md` §4.3). Printing is left to the caller.
pub fn dump_table<R: Read + Seek>(
    reader: &mut R,
    start_sector: u64,
    kind: TableKind,
    header: &Header,
) -> Result<Vec<u32>> {
    let sectors = match kind {
        TableKind::GrainTable => grain_table_blocks(header),
        TableKind::GrainDirectory => dir_blocks(header),
    };
    let mut buf = vec![0u8; (sectors * SECTOR_SIZE) as usize];
    sector::read_exact_at(reader, start_sector * SECTOR_SIZE, &mut buf)?;
    Ok(buf
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}
