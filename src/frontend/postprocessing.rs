//! Fragment finalisation after encoding
//!
//! Once the kernel has filled the parity payloads, every fragment in the
//! stripe gets its header stamped: index, sizes, producing backend, and the
//! payload/metadata checksums.

use crate::args::ChecksumType;
use crate::backend::BackendDescriptor;
use crate::fragment::{header, Fragment};

/// Stamp complete headers onto all `k + m` fragments of a freshly encoded
/// stripe.
pub(crate) fn finalize_after_encode(
    descriptor: &BackendDescriptor,
    ct: ChecksumType,
    blocksize: usize,
    orig_data_size: u64,
    data: &mut [Fragment],
    parity: &mut [Fragment],
) {
    for (i, frag) in data.iter_mut().chain(parity.iter_mut()).enumerate() {
        header::stamp(
            frag.as_mut_bytes(),
            &header::StampParams {
                idx: i as u32,
                blocksize: blocksize as u32,
                backend_metadata_size: descriptor.backend_metadata_size as u32,
                orig_data_size,
                chksum_type: ct,
                backend_id: descriptor.id as u8,
                backend_version: descriptor.version,
            },
        );
    }
}
