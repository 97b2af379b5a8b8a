//! VMDK descriptor text.
//!
//! On write this engine only ever emits one fixed template (`spec.md`
//! Non-goals: "validating or rewriting the textual descriptor beyond
//! emitting a fixed template on write"); on read it returns the raw bytes
//! and checks for the `createType="streamOptimized"` substring, exactly as
//! `vmdktool.c`'s `vmdkdesc()`/`vmdkinfo()` do with `strstr()`.

use crate::sector::SECTOR_SIZE;

/// The substring `vmdkinfo()` searches the descriptor for to recognize a
/// stream-optimized extent.
const STREAM_OPTIMIZED_MARKER: &str = "createType=\"streamOptimized\"";

/// Does this descriptor text declare `createType="streamOptimized"`?
pub fn is_stream_optimized(descriptor_text: &str) -> bool {
    descriptor_text.contains(STREAM_OPTIMIZED_MARKER)
}

/// Render the fixed descriptor template this engine writes, padded with
/// NUL bytes to a whole sector. `capacity_sectors` is the final disk
/// capacity; the content ID and extent filename are placeholders matching
/// the original tool's generated output.
///
/// Cylinders are computed as `capacity_sectors / (63 * 255)`, the CHS
/// geometry convention `spec.md` §3 ("Descriptor block") specifies.
pub fn render_descriptor(capacity_sectors: u64, extent_filename: &str) -> Vec<u8> {
    let cylinders = capacity_sectors / 63 / 255;
    let text = format!(
        "# Disk DescriptorFile\n\
         version=1\n\
         CID=278f54ff\n\
         parentCID=ffffffff\n\
         createType=\"streamOptimized\"\n\
         \n\
         \n\
         # Extent description\n\
         RDONLY {capacity_sectors} SPARSE \"{extent_filename}\"\n\
         \n\
         #DDB\n\
         ddb.virtualHWVersion = \"4\"\n\
         ddb.geometry.cylinders = \"{cylinders}\"\n\
         ddb.geometry.heads = \"255\"\n\
         ddb.geometry.sectors = \"63\"\n\
         ddb.adapterType = \"lsilogic\"\n"
    );

    let mut block = vec![0u8; SECTOR_SIZE as usize];
    let bytes = text.as_bytes();
    block[..bytes.len()].copy_from_slice(bytes);
    block
}
