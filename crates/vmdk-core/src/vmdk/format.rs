//! Packed on-disk records: the sparse extent header and the stream marker.
//!
//! Both records are exactly 512 bytes, little-endian, with fixed field
//! offsets (`spec.md` §3). Rather than relying on compiler struct packing
//! (the C original's `__attribute__((__packed__))`), each record is encoded
//! and decoded explicitly against a `[u8; SECTOR_SIZE]` buffer. Decoding
//! never validates the magic number itself — callers (the inspector) decide
//! what to do with a mismatch.

use crate::sector::SECTOR_SIZE;

/// VMDK magic number ("VMDK" read as the big-endian composite 0x564D444B).
pub const VMDK_MAGIC: u32 = 0x564D_444B;

/// Sparse extent header version this engine writes and accepts.
pub const SUPPORTED_VERSION: u32 = 3;

/// Default grain size in sectors (128 sectors = 64 KiB).
pub const DEFAULT_GRAIN_SIZE: u64 = 128;

/// Grain table entries per grain table written by this engine.
pub const DEFAULT_GTES_PER_GT: u32 = 512;

/// Sectors of overhead reserved before grain data, minimum per `vmdktool.c`.
pub const MIN_OVERHEAD: u64 = 128;

const FLAGBIT_NL: u32 = 1 << 0;
const FLAGBIT_RGT: u32 = 1 << 1;
const FLAGBIT_ZGGTE: u32 = 1 << 2;
const FLAGBIT_COMPRESSED: u32 = 1 << 16;
const FLAGBIT_MARKERS: u32 = 1 << 17;

/// Flags written by this engine: valid-newline-detect, compressed grains, markers present.
pub const STREAM_OPTIMIZED_FLAGS: u32 = FLAGBIT_NL | FLAGBIT_COMPRESSED | FLAGBIT_MARKERS;

/// Compression algorithm: none.
pub const COMPRESSION_NONE: u16 = 0;
/// Compression algorithm: DEFLATE.
pub const COMPRESSION_DEFLATE: u16 = 1;

/// The raw 64-bit "all ones" sentinel meaning "the grain directory offset is in the footer".
const GD_SENTINEL_BITS: u64 = u64::MAX;

/// Tagged representation of the header's `gdOffset` field.
///
/// The all-ones sentinel is an in-band "look in the footer" signal in the
/// wire format; everywhere else in this engine it is represented as this
/// tagged value, decoded/encoded only at the format boundary
/// (`spec.md` Design Notes, "Sentinel gdOffset").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdOffset {
    /// The grain directory starts at this sector.
    Known(u64),
    /// The real offset is recorded in the footer header near the end of the stream.
    InFooter,
}

impl GdOffset {
    fn from_raw(raw: u64) -> Self {
        if raw == GD_SENTINEL_BITS {
            GdOffset::InFooter
        } else {
            GdOffset::Known(raw)
        }
    }

    fn to_raw(self) -> u64 {
        match self {
            GdOffset::Known(sector) => sector,
            GdOffset::InFooter => GD_SENTINEL_BITS,
        }
    }

    /// The known sector, if resolved.
    pub fn sector(self) -> Option<u64> {
        match self {
            GdOffset::Known(sector) => Some(sector),
            GdOffset::InFooter => None,
        }
    }
}

/// The 512-byte sparse extent header (`spec.md` §3, "SparseExtentHeader").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub flags: u32,
    pub capacity: u64,
    pub grain_size: u64,
    pub descriptor_offset: u64,
    pub descriptor_size: u64,
    pub num_gtes_per_gt: u32,
    pub rgd_offset: u64,
    pub gd_offset: GdOffset,
    pub overhead: u64,
    pub unclean_shutdown: bool,
    pub single_end_line_char: u8,
    pub non_end_line_char: u8,
    pub double_end_line_char1: u8,
    pub double_end_line_char2: u8,
    pub compress_algorithm: u16,
}

impl Header {
    /// Build the header this engine writes for a raw→vmdk conversion, before
    /// the final capacity and grain directory offset are known
    /// (`spec.md` §3 "Lifecycles": placeholder `gdOffset`/`capacity`).
    pub fn new_stream_optimized_placeholder(descriptor_size_sectors: u64) -> Self {
        let mut overhead = MIN_OVERHEAD;
        let min_needed = bytes_to_sectors(SECTOR_SIZE + descriptor_size_sectors * SECTOR_SIZE) + 1;
        if overhead < min_needed {
            overhead = min_needed;
        }
        Self {
            magic: VMDK_MAGIC,
            version: SUPPORTED_VERSION,
            flags: STREAM_OPTIMIZED_FLAGS,
            capacity: 0,
            grain_size: DEFAULT_GRAIN_SIZE,
            descriptor_offset: 1,
            descriptor_size: descriptor_size_sectors,
            num_gtes_per_gt: DEFAULT_GTES_PER_GT,
            rgd_offset: 0,
            gd_offset: GdOffset::InFooter,
            overhead,
            unclean_shutdown: false,
            single_end_line_char: b'\n',
            non_end_line_char: b' ',
            double_end_line_char1: b'\r',
            double_end_line_char2: b'\n',
            compress_algorithm: COMPRESSION_DEFLATE,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAGBIT_COMPRESSED != 0
    }

    pub fn has_markers(&self) -> bool {
        self.flags & FLAGBIT_MARKERS != 0
    }

    pub fn newline_detect_valid(&self) -> bool {
        self.flags & FLAGBIT_NL != 0
    }

    pub fn has_redundant_grain_table(&self) -> bool {
        self.flags & FLAGBIT_RGT != 0
    }

    pub fn zero_grain_gte_valid(&self) -> bool {
        self.flags & FLAGBIT_ZGGTE != 0
    }

    /// Total number of grains needed to cover `capacity` sectors.
    pub fn total_grains(&self) -> u64 {
        bytes_to_sectors_ceil_sectors(self.capacity, self.grain_size)
    }

    /// Number of grain tables (and hence grain directory entries) needed.
    pub fn num_grain_tables(&self) -> u64 {
        bytes_to_sectors_ceil_sectors(self.total_grains(), self.num_gtes_per_gt as u64)
    }

    /// Total disk capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity * SECTOR_SIZE
    }

    /// Grain size in bytes.
    pub fn grain_bytes(&self) -> u64 {
        self.grain_size * SECTOR_SIZE
    }

    /// Decode a header from a 512-byte buffer. Does not validate the magic.
    pub fn from_bytes(data: &[u8; SECTOR_SIZE as usize]) -> Self {
        Self {
            magic: u32::from_le_bytes(data[0..4].try_into().unwrap()),
            version: u32::from_le_bytes(data[4..8].try_into().unwrap()),
            flags: u32::from_le_bytes(data[8..12].try_into().unwrap()),
            capacity: u64::from_le_bytes(data[12..20].try_into().unwrap()),
            grain_size: u64::from_le_bytes(data[20..28].try_into().unwrap()),
            descriptor_offset: u64::from_le_bytes(data[28..36].try_into().unwrap()),
            descriptor_size: u64::from_le_bytes(data[36..44].try_into().unwrap()),
            num_gtes_per_gt: u32::from_le_bytes(data[44..48].try_into().unwrap()),
            rgd_offset: u64::from_le_bytes(data[48..56].try_into().unwrap()),
            gd_offset: GdOffset::from_raw(u64::from_le_bytes(data[56..64].try_into().unwrap())),
            overhead: u64::from_le_bytes(data[64..72].try_into().unwrap()),
            unclean_shutdown: data[72] != 0,
            single_end_line_char: data[73],
            non_end_line_char: data[74],
            double_end_line_char1: data[75],
            double_end_line_char2: data[76],
            compress_algorithm: u16::from_le_bytes(data[77..79].try_into().unwrap()),
        }
    }

    /// Encode the header into a fresh 512-byte buffer. The 432-byte pad is left zero.
    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE as usize] {
        let mut buf = [0u8; SECTOR_SIZE as usize];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..20].copy_from_slice(&self.capacity.to_le_bytes());
        buf[20..28].copy_from_slice(&self.grain_size.to_le_bytes());
        buf[28..36].copy_from_slice(&self.descriptor_offset.to_le_bytes());
        buf[36..44].copy_from_slice(&self.descriptor_size.to_le_bytes());
        buf[44..48].copy_from_slice(&self.num_gtes_per_gt.to_le_bytes());
        buf[48..56].copy_from_slice(&self.rgd_offset.to_le_bytes());
        buf[56..64].copy_from_slice(&self.gd_offset.to_raw().to_le_bytes());
        buf[64..72].copy_from_slice(&self.overhead.to_le_bytes());
        buf[72] = self.unclean_shutdown as u8;
        buf[73] = self.single_end_line_char;
        buf[74] = self.non_end_line_char;
        buf[75] = self.double_end_line_char1;
        buf[76] = self.double_end_line_char2;
        buf[77..79].copy_from_slice(&self.compress_algorithm.to_le_bytes());
        buf
    }
}

fn bytes_to_sectors(bytes: u64) -> u64 {
    (bytes + SECTOR_SIZE - 1) / SECTOR_SIZE
}

fn bytes_to_sectors_ceil_sectors(units: u64, per: u64) -> u64 {
    units / per + if units % per != 0 { 1 } else { 0 }
}

/// Marker meta-record type, valid when a marker's `size == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MarkerType {
    EndOfStream = 0,
    GrainTable = 1,
    GrainDirectory = 2,
    Footer = 3,
}

impl MarkerType {
    fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(MarkerType::EndOfStream),
            1 => Some(MarkerType::GrainTable),
            2 => Some(MarkerType::GrainDirectory),
            3 => Some(MarkerType::Footer),
            _ => None,
        }
    }
}

/// Decoded form of a 512-byte marker (`spec.md` §3, "Marker").
///
/// When `size > 0` the marker announces a grain: `val` is the grain's
/// logical sector and `tail` holds the first 500 bytes of compressed
/// payload. When `size == 0` the first 4 bytes of `tail` hold a `type`;
/// `raw_type` keeps the unparsed value so callers can warn on an
/// unrecognized type rather than fail.
#[derive(Debug, Clone)]
pub struct Marker {
    pub val: u64,
    pub size: u32,
    pub raw_type: u32,
    pub tail: Box<[u8; 500]>,
}

impl Marker {
    /// Build a grain marker: `val` is the grain's logical sector, `tail`
    /// holds (up to) the first 500 bytes of the compressed payload.
    pub fn grain(val: u64, size: u32, first_payload_bytes: &[u8]) -> Self {
        let mut tail = Box::new([0u8; 500]);
        let n = first_payload_bytes.len().min(500);
        tail[..n].copy_from_slice(&first_payload_bytes[..n]);
        Self {
            val,
            size,
            raw_type: 0,
            tail,
        }
    }

    /// Build a meta marker (grain table / grain directory / footer / EOS).
    /// `val` is the sector count of the data that follows (ignored for EOS).
    pub fn meta(marker_type: MarkerType, val: u64) -> Self {
        let mut tail = Box::new([0u8; 500]);
        tail[0..4].copy_from_slice(&(marker_type as u32).to_le_bytes());
        Self {
            val,
            size: 0,
            raw_type: marker_type as u32,
            tail,
        }
    }

    pub fn is_grain(&self) -> bool {
        self.size > 0
    }

    pub fn marker_type(&self) -> Option<MarkerType> {
        if self.size > 0 {
            None
        } else {
            MarkerType::from_u32(self.raw_type)
        }
    }

    pub fn from_bytes(data: &[u8; SECTOR_SIZE as usize]) -> Self {
        let val = u64::from_le_bytes(data[0..8].try_into().unwrap());
        let size = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let mut tail = Box::new([0u8; 500]);
        tail.copy_from_slice(&data[12..512]);
        let raw_type = if size == 0 {
            u32::from_le_bytes(tail[0..4].try_into().unwrap())
        } else {
            0
        };
        Self {
            val,
            size,
            raw_type,
            tail,
        }
    }

    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE as usize] {
        let mut buf = [0u8; SECTOR_SIZE as usize];
        buf[0..8].copy_from_slice(&self.val.to_le_bytes());
        buf[8..12].copy_from_slice(&self.size.to_le_bytes());
        buf[12..512].copy_from_slice(&*self.tail);
        buf
    }

    /// Number of sectors a grain's on-disk representation occupies
    /// (marker sector plus payload sectors), per `spec.md` §3 invariants.
    pub fn grain_sectors(size: u32) -> u64 {
        bytes_to_sectors(12 + size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_marker_are_exactly_one_sector() {
        assert_eq!(std::mem::size_of::<[u8; SECTOR_SIZE as usize]>(), 512);
        let h = Header::new_stream_optimized_placeholder(1);
        assert_eq!(h.to_bytes().len(), 512);
        let m = Marker::meta(MarkerType::Footer, 1);
        assert_eq!(m.to_bytes().len(), 512);
    }

    #[test]
    fn test_header_round_trips() {
        let mut h = Header::new_stream_optimized_placeholder(1);
        h.capacity = 2048;
        h.gd_offset = GdOffset::Known(4242);
        let bytes = h.to_bytes();
        let decoded = Header::from_bytes(&bytes);
        assert_eq!(decoded, h);
    }

    #[test]
    fn test_sentinel_round_trips_as_in_footer() {
        let h = Header::new_stream_optimized_placeholder(1);
        assert_eq!(h.gd_offset, GdOffset::InFooter);
        let bytes = h.to_bytes();
        let decoded = Header::from_bytes(&bytes);
        assert_eq!(decoded.gd_offset, GdOffset::InFooter);
        assert_eq!(decoded.gd_offset.sector(), None);
    }

    #[test]
    fn test_magic_matches_ascii_vmdk_big_endian_composite() {
        assert_eq!(VMDK_MAGIC, (('V' as u32) << 24) | (('M' as u32) << 16) | (('D' as u32) << 8) | 'K' as u32);
    }

    #[test]
    fn test_grain_marker_round_trip() {
        let payload = vec![0xAAu8; 30];
        let m = Marker::grain(128, 30, &payload);
        let bytes = m.to_bytes();
        let decoded = Marker::from_bytes(&bytes);
        assert!(decoded.is_grain());
        assert_eq!(decoded.val, 128);
        assert_eq!(decoded.size, 30);
        assert_eq!(&decoded.tail[..30], &payload[..]);
    }

    #[test]
    fn test_meta_marker_round_trip() {
        let m = Marker::meta(MarkerType::GrainTable, 4);
        let bytes = m.to_bytes();
        let decoded = Marker::from_bytes(&bytes);
        assert!(!decoded.is_grain());
        assert_eq!(decoded.marker_type(), Some(MarkerType::GrainTable));
        assert_eq!(decoded.val, 4);
    }

    #[test]
    fn test_grain_sector_count_rounds_up() {
        assert_eq!(Marker::grain_sectors(0), 1); // 12 bytes -> 1 sector
        assert_eq!(Marker::grain_sectors(500), 1); // 512 bytes exactly
        assert_eq!(Marker::grain_sectors(501), 2);
    }
}
