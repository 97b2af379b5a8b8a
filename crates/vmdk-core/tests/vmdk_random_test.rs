//! Random-access extraction scenarios (`spec.md` §8, scenarios 3 and 4).

use std::io::Cursor;

use vmdk_core::diagnostics::Diagnostics;
use vmdk_core::vmdk::format::GdOffset;
use vmdk_core::vmdk::inspector::{self, InspectOptions};
use vmdk_core::vmdk::random;
use vmdk_core::vmdk::writer::{write_stream_optimized, WriterOptions};

fn two_mebibyte_mixed_image() -> Vec<u8> {
    let grain_bytes = 128 * 512usize;
    let mut input = vec![0x55u8; 2 * 1024 * 1024];
    input[0..grain_bytes].fill(0);
    input[2 * grain_bytes..3 * grain_bytes].fill(0);
    input
}

#[test]
fn test_random_access_extraction_reproduces_the_source_image() {
    let input = two_mebibyte_mixed_image();
    let mut src = Cursor::new(input.clone());
    let mut out = Cursor::new(Vec::new());
    let mut diag = Diagnostics::new(0);
    let header = write_stream_optimized(&mut src, &mut out, WriterOptions::default(), &mut diag).unwrap();

    let mut vmdk = Cursor::new(out.into_inner());
    let mut extracted = Cursor::new(vec![0u8; input.len()]);
    random::extract(&mut vmdk, &header, &mut extracted, &mut diag).unwrap();
    assert_eq!(extracted.into_inner(), input);
}

#[test]
fn test_sentinel_gd_offset_is_discovered_via_the_footer_before_random_access() {
    let input = two_mebibyte_mixed_image();
    let mut src = Cursor::new(input.clone());
    let mut out = Cursor::new(Vec::new());
    let mut diag = Diagnostics::new(0);
    write_stream_optimized(&mut src, &mut out, WriterOptions::default(), &mut diag).unwrap();
    let vmdk_bytes = out.into_inner();
    let input_len = vmdk_bytes.len() as u64;

    // Blank the on-disk header's gdOffset back to the sentinel, as if the
    // writer had never resolved it (`spec.md` §4.2, footer discovery).
    let mut blanked = vmdk_bytes.clone();
    blanked[56..64].copy_from_slice(&u64::MAX.to_le_bytes());

    let mut reader = Cursor::new(blanked);
    let inspection = inspector::inspect(
        &mut reader,
        &mut diag,
        InspectOptions {
            allow_footer_search: true,
            input_len,
        },
    )
    .unwrap();
    assert_ne!(inspection.header.gd_offset, GdOffset::InFooter);

    let mut extracted = Cursor::new(vec![0u8; input.len()]);
    random::extract(&mut reader, &inspection.header, &mut extracted, &mut diag).unwrap();
    assert_eq!(extracted.into_inner(), input);
}
