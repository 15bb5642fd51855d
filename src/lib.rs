//! stripecode - pluggable erasure-coding frontend
//!
//! Turns an opaque payload into `k + m` equally-sized, self-describing
//! fragments such that the payload survives the loss of any `m` of them
//! (or `hd - 1` for the flat-XOR family), then recovers the payload or
//! rebuilds individual fragments after loss.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Frontend Dispatcher                         │
//! │      (descriptor registry, encode/decode/reconstruct ops)        │
//! ├───────────────┬──────────────────────────────┬───────────────────┤
//! │ Preprocessing │        Coding Backend        │  Postprocessing   │
//! │ (align, pad,  │   null | reed-solomon (GF    │ (header stamping, │
//! │  partition)   │   2^16) | flat-XOR HD        │   checksums)      │
//! ├───────────────┴──────────────────────────────┴───────────────────┤
//! │        Fragment protocol (80-byte header + aligned buffers)      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use stripecode::{self as ec, BackendId, ChecksumType, EcArgs};
//!
//! let mut args = EcArgs::new(10, 4);
//! args.ct = ChecksumType::Crc32;
//! let desc = ec::instance_create(BackendId::LiberasurecodeRsVand, &args).unwrap();
//!
//! let payload = vec![0x78u8; 1 << 20];
//! let stripe = ec::encode(desc, &payload).unwrap();
//!
//! // Any 10 of the 14 fragments recover the payload
//! let survivors: Vec<&[u8]> = stripe.fragments().skip(4).map(|f| f.as_bytes()).collect();
//! let recovered = ec::decode(desc, &survivors, false).unwrap();
//! assert_eq!(&*recovered, payload.as_slice());
//!
//! ec::decode_cleanup(desc, recovered).unwrap();
//! ec::encode_cleanup(desc, stripe).unwrap();
//! ec::instance_destroy(desc).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`args`] - code parameters and backend identification
//! - [`fragment`] - on-wire fragment layout and header codec
//! - [`chksum`] - CRC32 and algebraic signatures
//! - [`frontend`] - instance registry and the public operations
//! - [`error`] - error types with stable numeric codes

pub mod args;
pub mod chksum;
pub mod error;
pub mod fragment;
pub mod frontend;

pub(crate) mod backend;
pub(crate) mod gf;
pub(crate) mod rs_vand;
pub(crate) mod xor_code;

#[cfg(test)]
mod proptest;

// Re-export the operation surface and its types
pub use args::{BackendArgs, BackendId, ChecksumType, EcArgs, MAX_FRAGMENTS};
pub use chksum::AlgSig;
pub use error::{Error, Result};
pub use fragment::{Fragment, FragmentMetadata, FRAGMENT_MAGIC, HEADER_SIZE};
pub use frontend::{
    decode, decode_cleanup, encode, encode_cleanup, fragments_needed, get_aligned_data_size,
    get_fragment_metadata, get_fragment_size, get_minimum_encode_size, instance_create,
    instance_destroy, reconstruct_fragment, verify_stripe_metadata, DecodedData, EncodedStripe,
    FragmentStatus, InstanceDesc, StripeReport,
};

const fn make_version(major: u32, minor: u32, rev: u32) -> u32 {
    (major << 16) | (minor << 8) | rev
}

/// Library version stamped into every fragment header,
/// `(major << 16) | (minor << 8) | rev`.
pub const LIB_VERSION: u32 = make_version(0, 1, 0);
