//! Checksums for fragment payloads and metadata
//!
//! CRC32 (IEEE) guards individual fragments; the [`alg_sig`] module provides
//! Galois-field Horner signatures whose linearity lets a verifier check a
//! whole stripe from per-fragment signatures alone.

pub mod alg_sig;

pub use alg_sig::AlgSig;

/// CRC32 (IEEE) over a buffer
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
