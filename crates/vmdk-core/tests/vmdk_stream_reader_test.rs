//! Streaming extraction scenarios (`spec.md` §8: both extractors agree).

use std::io::{Cursor, Seek, SeekFrom};

use vmdk_core::diagnostics::Diagnostics;
use vmdk_core::sector::SECTOR_SIZE;
use vmdk_core::vmdk::{random, stream_reader};
use vmdk_core::vmdk::writer::{write_stream_optimized, WriterOptions};

#[test]
fn test_streaming_and_random_access_agree_byte_for_byte() {
    let input: Vec<u8> = (0..768 * 1024).map(|i| ((i * 31) % 256) as u8).collect();
    let mut src = Cursor::new(input.clone());
    let mut out = Cursor::new(Vec::new());
    let mut diag = Diagnostics::new(0);
    let mut header = write_stream_optimized(&mut src, &mut out, WriterOptions::default(), &mut diag).unwrap();
    let vmdk_bytes = out.into_inner();

    let mut random_out = Cursor::new(vec![0u8; input.len()]);
    random::extract(&mut Cursor::new(vmdk_bytes.clone()), &header, &mut random_out, &mut diag).unwrap();

    let mut stream_in = Cursor::new(vmdk_bytes);
    stream_in.seek(SeekFrom::Start(header.overhead * SECTOR_SIZE)).unwrap();
    let mut stream_out = Cursor::new(vec![0u8; input.len()]);
    stream_reader::extract(&mut stream_in, &mut header, &mut stream_out, &mut diag).unwrap();

    let random_bytes = random_out.into_inner();
    let stream_bytes = stream_out.into_inner();
    assert_eq!(random_bytes, stream_bytes);
    assert_eq!(random_bytes, input);
}

#[test]
fn test_streaming_resolves_the_sentinel_gd_offset_from_the_embedded_footer() {
    let input = vec![0x99u8; 192 * 1024];
    let mut src = Cursor::new(input.clone());
    let mut out = Cursor::new(Vec::new());
    let mut diag = Diagnostics::new(0);
    let resolved = write_stream_optimized(&mut src, &mut out, WriterOptions::default(), &mut diag).unwrap();
    let vmdk_bytes = out.into_inner();

    let mut header = vmdk_core::vmdk::format::Header::new_stream_optimized_placeholder(1);
    header.capacity = 0; // deliberately unresolved, as a caller who skipped `inspect` would see
    header.grain_size = resolved.grain_size;
    header.overhead = resolved.overhead;
    header.compress_algorithm = resolved.compress_algorithm;

    let mut stream_in = Cursor::new(vmdk_bytes);
    stream_in.seek(SeekFrom::Start(header.overhead * SECTOR_SIZE)).unwrap();
    let mut stream_out = Cursor::new(vec![0u8; input.len()]);
    stream_reader::extract(&mut stream_in, &mut header, &mut stream_out, &mut diag).unwrap();

    assert_eq!(header.gd_offset, resolved.gd_offset);
    assert_eq!(stream_out.into_inner(), input);
}
