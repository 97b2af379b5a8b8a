//! Streaming extraction: walk markers forward from the current position
//! without ever seeking backward except to step over a footer
//! (`vmdktool.c`'s `vmdkparsestream()`). Unlike [`super::random`], this
//! path tolerates a source that can only be read once, at the cost of
//! needing the output to support random access (grains still land at
//! their logical offset, which rarely matches stream order).

use std::io::{Read, Seek, SeekFrom, Write};

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::sector::{self, SECTOR_SIZE};
use crate::vmdk::deflate;
use crate::vmdk::format::{GdOffset, Header, Marker, MarkerType};
use crate::vmdk::inspector::{self, InspectOptions};

/// Read markers from `input`'s current position until end-of-stream,
/// writing every grain's decompressed payload to `output` at its logical
/// offset. If the header's `gdOffset` is the footer sentinel, it is
/// resolved in place from the footer marker encountered along the way
/// (`spec.md` §4.5).
pub fn extract<R: Read + Seek, W: Write + Seek>(
    input: &mut R,
    header: &mut Header,
    output: &mut W,
    diag: &mut Diagnostics,
) -> Result<()> {
    let grain_bytes = header.grain_bytes() as usize;
    let mut eos_seen = false;

    loop {
        let pos = input.stream_position()?;
        let mut marker_buf = [0u8; SECTOR_SIZE as usize];
        let n = sector::read_zero_padded(input, &mut marker_buf)?;
        if n == 0 {
            break;
        }
        if n < marker_buf.len() {
            break;
        }

        if eos_seen {
            diag.warn(Warning::ExtraAfterEos);
        }

        let marker = Marker::from_bytes(&marker_buf);
        if marker.is_grain() {
            read_grain_payload(input, header, &marker, grain_bytes, output)?;
            continue;
        }

        match marker.marker_type() {
            Some(MarkerType::GrainTable) | Some(MarkerType::GrainDirectory) => {
                input.seek(SeekFrom::Current((marker.val * SECTOR_SIZE) as i64))?;
            }
            Some(MarkerType::Footer) => {
                let resume_at = pos + SECTOR_SIZE + marker.val * SECTOR_SIZE;
                let footer = inspector::inspect(
                    input,
                    diag,
                    InspectOptions {
                        allow_footer_search: false,
                        input_len: 0,
                    },
                )?;
                if header.gd_offset == GdOffset::InFooter {
                    header.gd_offset = footer.header.gd_offset;
                    header.capacity = footer.header.capacity;
                }
                input.seek(SeekFrom::Start(resume_at))?;
            }
            Some(MarkerType::EndOfStream) => {
                eos_seen = true;
            }
            None => {
                diag.warn(Warning::UnknownMarkerType(marker.raw_type));
            }
        }
    }

    Ok(())
}

/// Decompress a grain's payload and write it to `output` at its logical
/// offset (`vmdktool.c`'s `marker2grain()` plus the write side of
/// `vmdkparsestream()`'s grain case).
fn read_grain_payload<R: Read, W: Write + Seek>(
    input: &mut R,
    header: &Header,
    marker: &Marker,
    grain_bytes: usize,
    output: &mut W,
) -> Result<()> {
    let first = marker.size.min(500) as usize;
    let mut compressed = vec![0u8; marker.size as usize];
    compressed[..first].copy_from_slice(&marker.tail[..first]);
    if marker.size as usize > first {
        input.read_exact(&mut compressed[first..])?;
    }

    // A grain's on-disk footprint is a whole number of sectors; consume
    // the pad between the payload's end and that boundary so the stream
    // cursor lands exactly on the next marker.
    let want_sectors = Marker::grain_sectors(marker.size);
    let consumed = 12 + marker.size as u64;
    let pad = want_sectors * SECTOR_SIZE - consumed;
    if pad > 0 {
        let mut discard = vec![0u8; pad as usize];
        input.read_exact(&mut discard)?;
    }

    let payload = if header.is_compressed() {
        deflate::decompress_grain(&compressed, grain_bytes)?
    } else {
        compressed
    };

    sector::write_at(output, marker.val * SECTOR_SIZE, &payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream_image_single_grain() -> (Header, Vec<u8>, Vec<u8>) {
        let mut header = Header::new_stream_optimized_placeholder(1);
        header.grain_size = 8;
        header.capacity = header.grain_size * 2;
        header.gd_offset = GdOffset::Known(999);

        let grain_data = vec![0x5cu8; (header.grain_size * SECTOR_SIZE) as usize];
        let compressed = deflate::compress_grain(&grain_data, 6).unwrap();
        let marker = Marker::grain(0, compressed.len() as u32, &compressed);

        let mut stream = Vec::new();
        stream.extend_from_slice(&marker.to_bytes());
        if compressed.len() > 500 {
            stream.extend_from_slice(&compressed[500..]);
        }
        while stream.len() % SECTOR_SIZE as usize != 0 {
            stream.push(0);
        }
        stream.extend_from_slice(&Marker::meta(MarkerType::EndOfStream, 0).to_bytes());
        (header, stream, grain_data)
    }

    #[test]
    fn test_extracts_grain_from_marker_stream() {
        let (mut header, stream, grain_data) = stream_image_single_grain();
        let mut input = Cursor::new(stream);
        let mut output = Cursor::new(vec![0u8; grain_data.len()]);
        let mut diag = Diagnostics::new(0);
        extract(&mut input, &mut header, &mut output, &mut diag).unwrap();
        let out = output.into_inner();
        assert_eq!(&out[..grain_data.len()], &grain_data[..]);
        assert!(diag.warnings.is_empty());
    }

    #[test]
    fn test_warns_on_trailing_data_after_eos() {
        let (mut header, mut stream, _grain_data) = stream_image_single_grain();
        stream.extend_from_slice(&[0u8; SECTOR_SIZE as usize]);
        let mut input = Cursor::new(stream);
        let mut output = Cursor::new(vec![0u8; header.grain_bytes() as usize]);
        let mut diag = Diagnostics::new(0);
        extract(&mut input, &mut header, &mut output, &mut diag).unwrap();
        assert!(diag
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::ExtraAfterEos)));
    }

    #[test]
    fn test_warns_on_unknown_marker_type() {
        let mut header = Header::new_stream_optimized_placeholder(1);
        header.grain_size = 8;
        header.gd_offset = GdOffset::Known(5);
        let mut weird = Marker::meta(MarkerType::EndOfStream, 0);
        weird.raw_type = 77;
        weird.tail[0..4].copy_from_slice(&77u32.to_le_bytes());

        let mut input = Cursor::new(weird.to_bytes().to_vec());
        let mut output = Cursor::new(Vec::new());
        let mut diag = Diagnostics::new(0);
        extract(&mut input, &mut header, &mut output, &mut diag).unwrap();
        assert!(diag
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::UnknownMarkerType(77))));
    }
}
