//! The stream-optimized VMDK format engine.
//!
//! - [`format`] — packed `Header`/`Marker` codecs and the magic/flag constants.
//! - [`deflate`] — single-shot DEFLATE compress/decompress of a grain payload.
//! - [`descriptor`] — the fixed descriptor template and `streamOptimized` detection.
//! - [`inspector`] — header/footer/descriptor inspection and raw table dumps.
//! - [`random`] — random-access extraction via the grain directory.
//! - [`stream_reader`] — streaming extraction by walking markers forward.
//! - [`writer`] — raw → stream-optimized VMDK production.

pub mod deflate;
pub mod descriptor;
pub mod format;
pub mod inspector;
pub mod random;
pub mod stream_reader;
pub mod writer;

pub use format::{GdOffset, Header, Marker, MarkerType, VMDK_MAGIC};
