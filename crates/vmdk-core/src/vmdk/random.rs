//! Random-access extraction: grain directory → grain table → grain marker
//! (`vmdktool.c`'s `readentry()`/`grain2raw()`/`allgrains2raw()`).

use std::io::{Read, Seek, SeekFrom, Write};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::sector::{self, SECTOR_SIZE};
use crate::vmdk::deflate;
use crate::vmdk::format::{Header, Marker};
use crate::vmdk::inspector::{self, TableKind};

/// Walk the grain directory and every grain table it points to, writing
/// each grain's decompressed payload to `output` at its logical offset
/// (`spec.md` §4.4).
///
/// `input` must support random access to the grain directory, grain
/// tables, and every grain marker; `output` must support random access
/// because grains may be visited out of logical order and grain zero is
/// never written (leaving a sparse hole, `spec.md` §4.7).
pub fn extract<R: Read + Seek, W: Write + Seek>(
    input: &mut R,
    header: &Header,
    output: &mut W,
    _diag: &mut Diagnostics,
) -> Result<()> {
    if header.is_compressed() && !matches!(
        header.compress_algorithm,
        crate::vmdk::format::COMPRESSION_NONE | crate::vmdk::format::COMPRESSION_DEFLATE
    ) {
        return Err(Error::UnsupportedCompression {
            algorithm: header.compress_algorithm,
        });
    }
    let gd_sector = header.gd_offset.sector().ok_or(Error::NotStreamOptimized)?;
    let entries = inspector::dump_table(input, gd_sector, TableKind::GrainDirectory, header)?;
    let num_grain_tables = header.num_grain_tables() as usize;

    for (gt_index, &gt_sector) in entries.iter().take(num_grain_tables).enumerate() {
        if gt_sector == 0 {
            continue;
        }
        let gt_entries =
            inspector::dump_table(input, gt_sector as u64, TableKind::GrainTable, header)?;
        for (slot, &grain_sector) in gt_entries.iter().enumerate() {
            // A grain sector of 0 or 1 is a hole: 0 is the never-written
            // sentinel and 1 is the header's own sector, never a valid
            // grain location (`vmdktool.c`'s `grain2raw()`: `blk <= 1`).
            if grain_sector <= 1 {
                continue;
            }
            let grain_index = gt_index * header.num_gtes_per_gt as usize + slot;
            if grain_index as u64 >= header.total_grains() {
                break;
            }
            read_one_grain(input, header, grain_sector as u64, grain_index as u64, output)?;
        }
    }

    Ok(())
}

/// Decode the marker at `grain_sector`, decompress its payload, and write
/// it to `output` at the logical byte offset of grain `grain_index`
/// (`vmdktool.c`'s `grain2raw()`).
fn read_one_grain<R: Read + Seek, W: Write + Seek>(
    input: &mut R,
    header: &Header,
    grain_sector: u64,
    grain_index: u64,
    output: &mut W,
) -> Result<()> {
    input.seek(SeekFrom::Start(grain_sector * SECTOR_SIZE))?;
    let mut marker_buf = [0u8; SECTOR_SIZE as usize];
    input.read_exact(&mut marker_buf)?;
    let marker = Marker::from_bytes(&marker_buf);

    if !marker.is_grain() {
        return Err(Error::CorruptGrain {
            message: format!("expected grain marker at sector {grain_sector}, found meta marker"),
        });
    }
    if marker.val != grain_index * header.grain_size {
        return Err(Error::CorruptGrain {
            message: format!(
                "grain marker at sector {grain_sector} claims lba {}, expected {}",
                marker.val,
                grain_index * header.grain_size
            ),
        });
    }

    let want_sectors = Marker::grain_sectors(marker.size);
    let mut compressed = vec![0u8; (want_sectors * SECTOR_SIZE - 12) as usize];
    let first = marker.size.min(500) as usize;
    compressed[..first].copy_from_slice(&marker.tail[..first]);
    if marker.size as usize > first {
        input.read_exact(&mut compressed[first..marker.size as usize])?;
    }
    compressed.truncate(marker.size as usize);

    let grain_bytes = header.grain_bytes() as usize;
    let payload = if header.is_compressed() {
        deflate::decompress_grain(&compressed, grain_bytes)?
    } else {
        if compressed.len() != grain_bytes {
            return Err(Error::CorruptGrain {
                message: format!(
                    "uncompressed grain at sector {grain_sector} has {} bytes, expected {grain_bytes}",
                    compressed.len()
                ),
            });
        }
        compressed
    };

    sector::write_at(output, grain_index * header.grain_bytes(), &payload)?;
    Ok(())
}
