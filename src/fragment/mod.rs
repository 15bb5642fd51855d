//! Fragment layout and metadata protocol
//!
//! A fragment is the on-wire unit of this library: a packed 80-byte header
//! ([`header`]) followed by the payload region, held in a 16-byte-aligned
//! owned buffer ([`buffer::Fragment`]).

pub mod buffer;
pub mod header;

pub use buffer::Fragment;
pub use header::{FragmentMetadata, FRAGMENT_MAGIC, HEADER_SIZE};
