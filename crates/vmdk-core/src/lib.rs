//! vmdk-core: bidirectional converter/inspector for stream-optimized VMDK
//! sparse disk images.
//!
//! Given a raw block-device image, [`vmdk::writer`] produces a compressed,
//! sparse, stream-optimized VMDK. Given such a VMDK, [`vmdk::random`] and
//! [`vmdk::stream_reader`] reconstruct the raw image, either by following
//! the grain directory at random or by walking the file as a forward
//! stream of markers. [`vmdk::inspector`] reads header/footer fields,
//! descriptor text, and grain directory/table contents without converting
//! anything.
//!
//! # Modules
//!
//! - `error` - Error types and `Result` alias
//! - `sector` - Byte I/O and sector arithmetic shared by every component
//! - `diagnostics` - Explicit verbosity/warning threading (no global state)
//! - `vmdk` - The on-disk format engine: packed codecs, DEFLATE, descriptor
//!   text, inspection, and both conversion directions

pub mod diagnostics;
pub mod error;
pub mod sector;
pub mod vmdk;

pub use error::{Error, Result};
