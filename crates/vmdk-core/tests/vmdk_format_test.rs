//! Integration-level checks of the packed header/marker encoding
//! (`spec.md` §8, "sizeof(Header) == 512 and sizeof(Marker) == 512").

use vmdk_core::vmdk::format::{GdOffset, Header, Marker, MarkerType, VMDK_MAGIC};

#[test]
fn test_header_and_marker_encode_to_exactly_one_sector() {
    let header = Header::new_stream_optimized_placeholder(1);
    assert_eq!(header.to_bytes().len(), 512);

    let marker = Marker::grain(0, 0, &[]);
    assert_eq!(marker.to_bytes().len(), 512);
}

#[test]
fn test_header_round_trips_through_bytes_with_every_field_set() {
    let mut header = Header::new_stream_optimized_placeholder(1);
    header.capacity = 4_194_304;
    header.grain_size = 256;
    header.num_gtes_per_gt = 1024;
    header.rgd_offset = 77;
    header.gd_offset = GdOffset::Known(9001);
    header.unclean_shutdown = true;
    header.compress_algorithm = vmdk_core::vmdk::format::COMPRESSION_DEFLATE;

    let decoded = Header::from_bytes(&header.to_bytes());
    assert_eq!(decoded, header);
    assert_eq!(decoded.magic, VMDK_MAGIC);
}

#[test]
fn test_footer_sentinel_and_known_offsets_both_round_trip() {
    let mut header = Header::new_stream_optimized_placeholder(1);
    assert_eq!(header.gd_offset, GdOffset::InFooter);
    assert_eq!(Header::from_bytes(&header.to_bytes()).gd_offset, GdOffset::InFooter);

    header.gd_offset = GdOffset::Known(42);
    assert_eq!(Header::from_bytes(&header.to_bytes()).gd_offset, GdOffset::Known(42));
}

#[test]
fn test_grain_marker_preserves_payload_and_lba() {
    let payload: Vec<u8> = (0u8..=255).cycle().take(480).collect();
    let marker = Marker::grain(12_345, payload.len() as u32, &payload);
    let decoded = Marker::from_bytes(&marker.to_bytes());

    assert!(decoded.is_grain());
    assert_eq!(decoded.val, 12_345);
    assert_eq!(decoded.size, payload.len() as u32);
    assert_eq!(&decoded.tail[..payload.len()], &payload[..]);
}

#[test]
fn test_meta_marker_type_survives_round_trip_for_every_variant() {
    for (marker_type, val) in [
        (MarkerType::EndOfStream, 0),
        (MarkerType::GrainTable, 4),
        (MarkerType::GrainDirectory, 1),
        (MarkerType::Footer, 1),
    ] {
        let marker = Marker::meta(marker_type, val);
        let decoded = Marker::from_bytes(&marker.to_bytes());
        assert!(!decoded.is_grain());
        assert_eq!(decoded.marker_type(), Some(marker_type));
        assert_eq!(decoded.val, val);
    }
}
