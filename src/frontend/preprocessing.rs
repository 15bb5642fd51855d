//! Buffer preparation around the coding kernels
//!
//! Encode-side: alignment math, padding, and the split of the original
//! payload into `k` aligned fragment buffers plus `m` zeroed parity buffers.
//! Decode-side: slotting caller fragments by their header index, fabricating
//! aligned working buffers for the missing slots, and re-assembling the
//! original payload from the data fragments.

use tracing::debug;

use crate::error::{Error, Result};
use crate::fragment::{header, Fragment, HEADER_SIZE};

/// Round `data_len` up to a multiple of `k` words of the backend's element
/// size, so every fragment holds a whole number of code words.
pub(crate) fn aligned_data_size(k: usize, element_size_bits: usize, data_len: u64) -> u64 {
    let alignment_multiple = (k * element_size_bits / 8) as u64;
    data_len.div_ceil(alignment_multiple) * alignment_multiple
}

// =============================================================================
// Encode-side
// =============================================================================

#[derive(Debug)]
pub(crate) struct EncodeBuffers {
    pub data: Vec<Fragment>,
    pub parity: Vec<Fragment>,
    pub blocksize: usize,
}

/// Allocate the stripe buffers for an encode call and copy the payload into
/// the data fragments, zero-padding the tail.
pub(crate) fn prepare_for_encode(
    k: usize,
    m: usize,
    element_size_bits: usize,
    backend_metadata_size: usize,
    orig_data: &[u8],
) -> Result<EncodeBuffers> {
    if orig_data.is_empty() {
        return Err(Error::InvalidParams("cannot encode an empty payload".to_string()));
    }

    let aligned_len = aligned_data_size(k, element_size_bits, orig_data.len() as u64) as usize;
    let blocksize = aligned_len / k;
    let payload_len = blocksize + backend_metadata_size;

    let mut data = Vec::with_capacity(k);
    for chunk_start in (0..k).map(|i| i * blocksize) {
        let mut frag = Fragment::alloc(payload_len);
        if chunk_start < orig_data.len() {
            let copy_len = blocksize.min(orig_data.len() - chunk_start);
            frag.payload_mut()[..copy_len]
                .copy_from_slice(&orig_data[chunk_start..chunk_start + copy_len]);
        }
        data.push(frag);
    }

    let parity = (0..m).map(|_| Fragment::alloc(payload_len)).collect();

    debug!(
        orig_len = orig_data.len(),
        aligned_len, blocksize, "prepared encode buffers"
    );
    Ok(EncodeBuffers {
        data,
        parity,
        blocksize,
    })
}

// =============================================================================
// Decode-side
// =============================================================================

/// Slot fragments into their stripe positions by header index.
///
/// Duplicates are resolved by index, first occurrence wins. Returns the
/// slotted fragments and the list of missing positions.
pub(crate) fn partition<'a>(
    k: usize,
    m: usize,
    fragments: &[&'a [u8]],
) -> Result<(Vec<Option<&'a [u8]>>, Vec<usize>)> {
    let n = k + m;
    let mut slots: Vec<Option<&[u8]>> = vec![None; n];

    for &frag in fragments {
        let idx = header::fragment_idx(frag)? as usize;
        if idx >= n {
            return Err(Error::BadHeader(format!(
                "fragment index {} out of range for a {}+{} stripe",
                idx, k, m
            )));
        }
        if slots[idx].is_none() {
            slots[idx] = Some(frag);
        }
    }

    let missing: Vec<usize> = (0..n).filter(|&i| slots[i].is_none()).collect();
    if missing.len() > m {
        return Err(Error::InsufficientFragments {
            available: n - missing.len(),
            required: k,
        });
    }
    Ok((slots, missing))
}

/// Working stripe for a decode or reconstruct call: every slot holds an
/// aligned buffer, fabricated (and recorded in `realloc_bm`) where the
/// caller had nothing to offer.
pub(crate) struct PreparedStripe {
    pub data: Vec<Fragment>,
    pub parity: Vec<Fragment>,
    pub missing: Vec<usize>,
    pub orig_data_size: u64,
    pub payload_size: usize,
    /// Bit `i` set when slot `i`'s buffer was fabricated by the library
    /// rather than copied from caller bytes
    pub realloc_bm: u64,
}

/// Copy the slotted fragments into aligned working buffers and fill the
/// holes with zeroed ones, lifting the stripe geometry from the first
/// survivor with a valid header.
pub(crate) fn prepare_for_decode(
    k: usize,
    m: usize,
    slots: &[Option<&[u8]>],
    missing: &[usize],
    fragment_len: usize,
) -> Result<PreparedStripe> {
    let mut geometry = None;
    for frag in slots.iter().flatten() {
        if let Ok(meta) = header::read_metadata(frag) {
            geometry = Some((meta.orig_data_size, meta.size as usize));
            break;
        }
    }
    let Some((orig_data_size, payload_size)) = geometry else {
        return Err(Error::BadHeader(
            "no surviving fragment carries a valid header".to_string(),
        ));
    };

    let mut realloc_bm = 0u64;
    let mut buffers = Vec::with_capacity(k + m);
    for (i, slot) in slots.iter().enumerate() {
        match slot {
            Some(frag) => buffers.push(Fragment::from_bytes(frag)),
            None => {
                buffers.push(Fragment::alloc(fragment_len - HEADER_SIZE));
                realloc_bm |= 1 << i;
            }
        }
    }
    let parity = buffers.split_off(k);

    Ok(PreparedStripe {
        data: buffers,
        parity,
        missing: missing.to_vec(),
        orig_data_size,
        payload_size,
        realloc_bm,
    })
}

/// Assemble the original payload directly from the data fragments, without
/// touching a kernel. Returns `None` when any data fragment is absent (the
/// caller then runs a real decode).
pub(crate) fn fragments_to_string(
    k: usize,
    m: usize,
    fragments: &[&[u8]],
) -> Result<Option<Vec<u8>>> {
    if fragments.len() < k {
        return Ok(None);
    }

    let mut data: Vec<Option<&[u8]>> = vec![None; k];
    let mut orig_data_size: Option<u64> = None;
    let mut num_data = 0;

    for &frag in fragments {
        let idx = header::fragment_idx(frag)? as usize;
        if idx >= k + m {
            return Err(Error::BadHeader(format!(
                "fragment index {} out of range for a {}+{} stripe",
                idx, k, m
            )));
        }

        let frag_orig = header::orig_data_size(frag)?;
        match orig_data_size {
            None => orig_data_size = Some(frag_orig),
            Some(expected) if expected != frag_orig => {
                return Err(Error::InvalidParams(format!(
                    "inconsistent original data size across fragments: {} vs {}",
                    expected, frag_orig
                )));
            }
            Some(_) => {}
        }

        // Parity fragments are not needed here; duplicates resolve by index
        if idx < k && data[idx].is_none() {
            data[idx] = Some(frag);
            num_data += 1;
        }
    }

    if num_data != k {
        return Ok(None);
    }

    let total = orig_data_size.unwrap_or(0) as usize;
    let mut payload = Vec::with_capacity(total);
    let mut remaining = total;
    for frag in data.iter().flatten() {
        if remaining == 0 {
            break;
        }
        let size = header::payload_size(frag)? as usize;
        if HEADER_SIZE + size > frag.len() {
            return Err(Error::BadHeader(format!(
                "payload length {} exceeds fragment of {} bytes",
                size,
                frag.len()
            )));
        }
        let take = size.min(remaining);
        payload.extend_from_slice(&frag[HEADER_SIZE..HEADER_SIZE + take]);
        remaining -= take;
    }

    Ok(Some(payload))
}
