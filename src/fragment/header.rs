//! Fragment header codec
//!
//! Every fragment starts with a packed little-endian 80-byte header that
//! makes it self-describing: stripe position, payload size, original payload
//! size, producing backend, and CRC32 checksums over both the payload and
//! the metadata bytes themselves.
//!
//! Layout (byte offsets):
//!
//! ```text
//!  0  magic (u32) = 0x0b0c5ecc
//!  4  idx (u32)
//!  8  size (u32)                    payload length
//! 12  frag_backend_metadata_size (u32)
//! 16  orig_data_size (u64)
//! 24  chksum_type (u8)
//! 25  chksum (u32 x 8)
//! 57  chksum_mismatch (u8)
//! 58  backend_id (u8)
//! 59  backend_version (u32)
//! 63  libec_version (u32)
//! 67  metadata_chksum (u32)         CRC32 over bytes [4..63)
//! 71  reserved padding to 80 bytes so the payload stays 16-byte aligned
//! 80  payload
//! ```

use serde::{Deserialize, Serialize};

use crate::args::ChecksumType;
use crate::chksum;
use crate::error::{Error, Result};

/// Sentinel marking the start of every well-formed fragment
pub const FRAGMENT_MAGIC: u32 = 0x0b0c5ecc;

/// Total header length in bytes (padded to a multiple of 16)
pub const HEADER_SIZE: usize = 80;

const OFF_MAGIC: usize = 0;
const OFF_IDX: usize = 4;
const OFF_SIZE: usize = 8;
const OFF_BACKEND_META_SIZE: usize = 12;
const OFF_ORIG_DATA_SIZE: usize = 16;
const OFF_CHKSUM_TYPE: usize = 24;
const OFF_CHKSUM: usize = 25;
const OFF_CHKSUM_MISMATCH: usize = 57;
const OFF_BACKEND_ID: usize = 58;
const OFF_BACKEND_VERSION: usize = 59;
const OFF_LIBEC_VERSION: usize = 63;
const OFF_METADATA_CHKSUM: usize = 67;

/// Byte range covered by the metadata checksum
const META_RANGE: std::ops::Range<usize> = OFF_IDX..OFF_LIBEC_VERSION;

/// Number of checksum words in the header
pub const MAX_CHECKSUM_WORDS: usize = 8;

// =============================================================================
// Decoded Metadata
// =============================================================================

/// Decoded copy of a fragment's metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    /// Stripe position: `0..k` for data, `k..k+m` for parity
    pub idx: u32,
    /// Payload length in bytes (the blocksize)
    pub size: u32,
    /// Additional backend-specific bytes beyond `size`
    pub frag_backend_metadata_size: u32,
    /// Length of the original, pre-encode payload
    pub orig_data_size: u64,
    /// Payload checksum algorithm
    pub chksum_type: ChecksumType,
    /// Checksum words; word 0 holds the payload CRC32 for [`ChecksumType::Crc32`]
    pub chksum: [u32; MAX_CHECKSUM_WORDS],
    /// Set on the decoded copy when the stored payload checksum fails;
    /// never persisted back into the fragment
    pub chksum_mismatch: bool,
    /// Producing backend id (raw byte, see [`crate::BackendId`])
    pub backend_id: u8,
    /// Producing backend version, `(major << 16) | (minor << 8) | rev`
    pub backend_version: u32,
}

// =============================================================================
// Field-level accessors
// =============================================================================

fn read_u32(frag: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(frag[off..off + 4].try_into().expect("u32 field"))
}

fn read_u64(frag: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(frag[off..off + 8].try_into().expect("u64 field"))
}

fn write_u32(frag: &mut [u8], off: usize, v: u32) {
    frag[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn write_u64(frag: &mut [u8], off: usize, v: u64) {
    frag[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_magic(frag: &mut [u8]) {
    write_u32(frag, OFF_MAGIC, FRAGMENT_MAGIC);
}

fn check_magic(frag: &[u8]) -> Result<()> {
    if frag.len() < HEADER_SIZE {
        return Err(Error::BadHeader(format!(
            "fragment of {} bytes is shorter than the header",
            frag.len()
        )));
    }
    if read_u32(frag, OFF_MAGIC) != FRAGMENT_MAGIC {
        return Err(Error::BadHeader("missing fragment magic".to_string()));
    }
    Ok(())
}

/// Stripe index stored in the header
pub(crate) fn fragment_idx(frag: &[u8]) -> Result<u32> {
    check_magic(frag)?;
    Ok(read_u32(frag, OFF_IDX))
}

/// Payload length stored in the header
pub(crate) fn payload_size(frag: &[u8]) -> Result<u32> {
    check_magic(frag)?;
    Ok(read_u32(frag, OFF_SIZE))
}

/// Original payload length stored in the header
pub(crate) fn orig_data_size(frag: &[u8]) -> Result<u64> {
    check_magic(frag)?;
    Ok(read_u64(frag, OFF_ORIG_DATA_SIZE))
}

/// Payload region length: payload plus backend metadata bytes
pub(crate) fn buffer_size(frag: &[u8]) -> Result<usize> {
    check_magic(frag)?;
    Ok(read_u32(frag, OFF_SIZE) as usize + read_u32(frag, OFF_BACKEND_META_SIZE) as usize)
}

// =============================================================================
// Stamp / Validate
// =============================================================================

/// Everything `stamp` needs to know about the producing instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StampParams {
    pub idx: u32,
    pub blocksize: u32,
    pub backend_metadata_size: u32,
    pub orig_data_size: u64,
    pub chksum_type: ChecksumType,
    pub backend_id: u8,
    pub backend_version: u32,
}

/// Write a complete header onto `frag`.
///
/// Field order matters: the payload checksum is computed before the library
/// version and metadata checksum are written, and the metadata checksum is
/// computed last so it covers the final metadata bytes.
pub(crate) fn stamp(frag: &mut [u8], params: &StampParams) {
    write_magic(frag);
    write_u32(frag, OFF_IDX, params.idx);
    write_u32(frag, OFF_SIZE, params.blocksize);
    write_u32(frag, OFF_BACKEND_META_SIZE, params.backend_metadata_size);
    write_u64(frag, OFF_ORIG_DATA_SIZE, params.orig_data_size);
    frag[OFF_CHKSUM_TYPE] = params.chksum_type as u8;
    frag[OFF_CHKSUM_MISMATCH] = 0;
    frag[OFF_BACKEND_ID] = params.backend_id;
    write_u32(frag, OFF_BACKEND_VERSION, params.backend_version);

    for word in 0..MAX_CHECKSUM_WORDS {
        write_u32(frag, OFF_CHKSUM + word * 4, 0);
    }
    if params.chksum_type == ChecksumType::Crc32 {
        let payload_end = HEADER_SIZE + params.blocksize as usize;
        let crc = chksum::crc32(&frag[HEADER_SIZE..payload_end]);
        write_u32(frag, OFF_CHKSUM, crc);
    }

    write_u32(frag, OFF_LIBEC_VERSION, crate::LIB_VERSION);
    let meta_crc = chksum::crc32(&frag[META_RANGE]);
    write_u32(frag, OFF_METADATA_CHKSUM, meta_crc);
}

/// Decode the metadata block, verifying magic and the metadata checksum.
///
/// For CRC32-typed fragments the payload checksum is recomputed; a mismatch
/// sets `chksum_mismatch` on the returned copy rather than failing, so
/// callers can decide whether a stale payload is fatal.
pub(crate) fn read_metadata(frag: &[u8]) -> Result<FragmentMetadata> {
    check_magic(frag)?;

    let stored = read_u32(frag, OFF_METADATA_CHKSUM);
    let actual = chksum::crc32(&frag[META_RANGE]);
    if stored != actual {
        return Err(Error::BadHeader(format!(
            "metadata checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored, actual
        )));
    }

    let mut chksum = [0u32; MAX_CHECKSUM_WORDS];
    for (word, slot) in chksum.iter_mut().enumerate() {
        *slot = read_u32(frag, OFF_CHKSUM + word * 4);
    }

    let mut meta = FragmentMetadata {
        idx: read_u32(frag, OFF_IDX),
        size: read_u32(frag, OFF_SIZE),
        frag_backend_metadata_size: read_u32(frag, OFF_BACKEND_META_SIZE),
        orig_data_size: read_u64(frag, OFF_ORIG_DATA_SIZE),
        chksum_type: ChecksumType::from_u8(frag[OFF_CHKSUM_TYPE])?,
        chksum,
        chksum_mismatch: frag[OFF_CHKSUM_MISMATCH] != 0,
        backend_id: frag[OFF_BACKEND_ID],
        backend_version: read_u32(frag, OFF_BACKEND_VERSION),
    };

    if meta.chksum_type == ChecksumType::Crc32 {
        let payload_end = HEADER_SIZE + meta.size as usize;
        if payload_end > frag.len() {
            return Err(Error::BadHeader(format!(
                "payload length {} exceeds fragment of {} bytes",
                meta.size,
                frag.len()
            )));
        }
        if chksum::crc32(&frag[HEADER_SIZE..payload_end]) != meta.chksum[0] {
            meta.chksum_mismatch = true;
        }
    }

    Ok(meta)
}

/// Strict validation: magic, metadata checksum, and (for CRC32 fragments)
/// the payload checksum must all hold.
pub(crate) fn validate(frag: &[u8]) -> Result<()> {
    let meta = read_metadata(frag)?;
    if meta.chksum_mismatch {
        return Err(Error::BadChecksum { index: meta.idx });
    }
    Ok(())
}
