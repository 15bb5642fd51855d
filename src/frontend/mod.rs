//! Frontend dispatcher
//!
//! The public operation surface: a process-wide registry maps opaque
//! integer descriptors to live backend instances, and every operation runs
//! the preprocessing -> kernel -> postprocessing pipeline under the
//! registry's reader lock. `instance_destroy` takes the writer lock, so it
//! waits out any in-flight operation on the same descriptor.

pub(crate) mod postprocessing;
pub(crate) mod preprocessing;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::args::{BackendId, EcArgs};
use crate::backend::{create_backend, CodingBackend};
use crate::error::{Error, Result};
use crate::fragment::{header, Fragment, FragmentMetadata, HEADER_SIZE};

/// Opaque handle to a live instance; never zero.
pub type InstanceDesc = u32;

struct Instance {
    id: BackendId,
    backend: Box<dyn CodingBackend>,
    args: EcArgs,
}

static REGISTRY: Lazy<RwLock<HashMap<InstanceDesc, Instance>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
static NEXT_DESC: AtomicU32 = AtomicU32::new(1);

/// Run `f` against a live instance, holding the registry read lock for the
/// whole operation.
fn with_instance<T>(desc: InstanceDesc, f: impl FnOnce(&Instance) -> Result<T>) -> Result<T> {
    let registry = REGISTRY.read();
    let instance = registry
        .get(&desc)
        .ok_or_else(|| Error::BackendNotAvailable(format!("no instance with descriptor {}", desc)))?;
    f(instance)
}

// =============================================================================
// Instance lifecycle
// =============================================================================

/// Create a backend instance for EC operations and return its descriptor.
#[instrument]
pub fn instance_create(id: BackendId, args: &EcArgs) -> Result<InstanceDesc> {
    args.validate()?;
    let backend = create_backend(id, args)?;

    // Record the effective word size the backend settled on
    let mut effective = *args;
    effective.w = backend.element_size();

    let name = backend.descriptor().name;
    let desc = NEXT_DESC.fetch_add(1, Ordering::Relaxed);
    REGISTRY.write().insert(
        desc,
        Instance {
            id,
            backend,
            args: effective,
        },
    );
    debug!(desc, backend = name, k = args.k, m = args.m, "instance created");
    Ok(desc)
}

/// Tear down an instance. Waits for in-flight operations on the descriptor
/// to drain before the instance is dropped.
#[instrument]
pub fn instance_destroy(desc: InstanceDesc) -> Result<()> {
    let removed = REGISTRY.write().remove(&desc);
    match removed {
        Some(_) => Ok(()),
        None => Err(Error::InvalidParams(format!(
            "unknown instance descriptor {}",
            desc
        ))),
    }
}

// =============================================================================
// Encode
// =============================================================================

/// A freshly encoded stripe: `k` data fragments followed by `m` parity
/// fragments, all `fragment_len` bytes.
#[derive(Debug)]
pub struct EncodedStripe {
    pub data: Vec<Fragment>,
    pub parity: Vec<Fragment>,
    pub fragment_len: usize,
}

impl EncodedStripe {
    /// All fragments in stripe order, data first
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.data.iter().chain(self.parity.iter())
    }
}

/// Erasure-encode a payload into `k + m` self-describing fragments.
#[instrument(skip(orig_data), fields(orig_data_size = orig_data.len()))]
pub fn encode(desc: InstanceDesc, orig_data: &[u8]) -> Result<EncodedStripe> {
    with_instance(desc, |instance| {
        let EcArgs { k, m, ct, .. } = instance.args;
        let descriptor = instance.backend.descriptor();

        let mut bufs = preprocessing::prepare_for_encode(
            k,
            m,
            instance.backend.element_size(),
            descriptor.backend_metadata_size,
            orig_data,
        )?;
        instance
            .backend
            .encode(&bufs.data, &mut bufs.parity, bufs.blocksize)?;
        postprocessing::finalize_after_encode(
            descriptor,
            ct,
            bufs.blocksize,
            orig_data.len() as u64,
            &mut bufs.data,
            &mut bufs.parity,
        );

        let fragment_len = HEADER_SIZE + bufs.blocksize + descriptor.backend_metadata_size;
        debug!(fragment_len, "encode complete");
        Ok(EncodedStripe {
            data: bufs.data,
            parity: bufs.parity,
            fragment_len,
        })
    })
}

/// Release the buffers from an [`encode`] call.
///
/// Reclamation itself is by ownership; the call exists so teardown stays an
/// explicit, descriptor-checked step like in the C-era API.
pub fn encode_cleanup(desc: InstanceDesc, stripe: EncodedStripe) -> Result<()> {
    with_instance(desc, |_| {
        drop(stripe);
        Ok(())
    })
}

// =============================================================================
// Decode
// =============================================================================

/// Payload recovered by [`decode`]; dereferences to the raw bytes.
#[derive(Debug)]
pub struct DecodedData {
    bytes: Vec<u8>,
}

impl DecodedData {
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::ops::Deref for DecodedData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

fn check_fragment_lengths(fragments: &[&[u8]]) -> Result<usize> {
    let Some(first) = fragments.first() else {
        return Err(Error::InvalidParams("no fragments supplied".to_string()));
    };
    let fragment_len = first.len();
    if fragment_len <= HEADER_SIZE {
        return Err(Error::InvalidParams(format!(
            "fragment length {} leaves no payload",
            fragment_len
        )));
    }
    if fragments.iter().any(|f| f.len() != fragment_len) {
        return Err(Error::InvalidParams(
            "fragments of one stripe must share a length".to_string(),
        ));
    }
    Ok(fragment_len)
}

/// Recover the original payload from at least `k` fragments.
///
/// When every data fragment is present the payload is assembled without
/// touching the kernel. `force_metadata_checks` verifies every supplied
/// fragment (metadata and payload checksums) before any decoding happens.
#[instrument(skip(fragments), fields(num_fragments = fragments.len()))]
pub fn decode(
    desc: InstanceDesc,
    fragments: &[&[u8]],
    force_metadata_checks: bool,
) -> Result<DecodedData> {
    with_instance(desc, |instance| {
        let EcArgs { k, m, .. } = instance.args;
        let fragment_len = check_fragment_lengths(fragments)?;
        if fragments.len() < k {
            return Err(Error::InsufficientFragments {
                available: fragments.len(),
                required: k,
            });
        }

        if force_metadata_checks {
            for frag in fragments {
                header::validate(frag)?;
            }
        }

        // Fast path: with a systematic code and all data fragments present,
        // the payload is already sitting in the fragments
        if instance.backend.descriptor().is_systematic {
            if let Some(payload) = preprocessing::fragments_to_string(k, m, fragments)? {
                debug!("decode served from data fragments");
                return Ok(DecodedData { bytes: payload });
            }
        }

        let (slots, missing) = preprocessing::partition(k, m, fragments)?;
        let mut stripe = preprocessing::prepare_for_decode(k, m, &slots, &missing, fragment_len)?;
        instance.backend.decode(
            &mut stripe.data,
            &mut stripe.parity,
            &stripe.missing,
            stripe.payload_size,
            true,
        )?;

        let total = stripe.orig_data_size as usize;
        let mut bytes = Vec::with_capacity(total);
        let mut remaining = total;
        for frag in &stripe.data {
            if remaining == 0 {
                break;
            }
            let take = stripe.payload_size.min(remaining);
            bytes.extend_from_slice(&frag.payload()[..take]);
            remaining -= take;
        }

        debug!(
            recovered = stripe.missing.len(),
            realloc_bm = stripe.realloc_bm,
            "decode complete"
        );
        Ok(DecodedData { bytes })
    })
}

/// Release the payload from a [`decode`] call.
pub fn decode_cleanup(desc: InstanceDesc, data: DecodedData) -> Result<()> {
    with_instance(desc, |_| {
        drop(data);
        Ok(())
    })
}

// =============================================================================
// Reconstruct
// =============================================================================

/// Rebuild the fragment at `destination_idx` from the available fragments,
/// returning a byte-identical copy of the lost fragment.
#[instrument(skip(fragments), fields(num_fragments = fragments.len()))]
pub fn reconstruct_fragment(
    desc: InstanceDesc,
    fragments: &[&[u8]],
    destination_idx: usize,
) -> Result<Fragment> {
    with_instance(desc, |instance| {
        let EcArgs { k, m, ct, .. } = instance.args;
        if destination_idx >= k + m {
            return Err(Error::InvalidParams(format!(
                "destination index {} out of range for a {}+{} stripe",
                destination_idx, k, m
            )));
        }
        let fragment_len = check_fragment_lengths(fragments)?;
        if fragments.len() < k {
            return Err(Error::InsufficientFragments {
                available: fragments.len(),
                required: k,
            });
        }

        let (slots, missing) = preprocessing::partition(k, m, fragments)?;
        if let Some(present) = slots[destination_idx] {
            debug!(destination_idx, "destination already present, copying");
            return Ok(Fragment::from_bytes(present));
        }

        let mut stripe = preprocessing::prepare_for_decode(k, m, &slots, &missing, fragment_len)?;
        instance.backend.reconstruct(
            &mut stripe.data,
            &mut stripe.parity,
            &stripe.missing,
            destination_idx,
            stripe.payload_size,
        )?;

        let mut rebuilt = if destination_idx < k {
            std::mem::take(&mut stripe.data[destination_idx])
        } else {
            std::mem::take(&mut stripe.parity[destination_idx - k])
        };
        let descriptor = instance.backend.descriptor();
        header::stamp(
            rebuilt.as_mut_bytes(),
            &header::StampParams {
                idx: destination_idx as u32,
                blocksize: stripe.payload_size as u32,
                backend_metadata_size: descriptor.backend_metadata_size as u32,
                orig_data_size: stripe.orig_data_size,
                chksum_type: ct,
                backend_id: descriptor.id as u8,
                backend_version: descriptor.version,
            },
        );
        Ok(rebuilt)
    })
}

/// Minimum fragment set needed to rebuild `to_reconstruct` without reading
/// any fragment in `to_exclude`.
pub fn fragments_needed(
    desc: InstanceDesc,
    to_reconstruct: &[usize],
    to_exclude: &[usize],
) -> Result<Vec<usize>> {
    with_instance(desc, |instance| {
        let n = instance.args.num_fragments();
        for &idx in to_reconstruct.iter().chain(to_exclude.iter()) {
            if idx >= n {
                return Err(Error::InvalidParams(format!(
                    "fragment index {} out of range for {} fragments",
                    idx, n
                )));
            }
        }
        instance.backend.min_fragments(to_reconstruct, to_exclude)
    })
}

// =============================================================================
// Metadata & verification
// =============================================================================

/// Decode one fragment's metadata block, recomputing the payload checksum.
pub fn get_fragment_metadata(desc: InstanceDesc, fragment: &[u8]) -> Result<FragmentMetadata> {
    with_instance(desc, |_| header::read_metadata(fragment))
}

/// Per-fragment outcome of [`verify_stripe_metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    /// Header and checksums hold, and the fragment belongs to this backend
    Ok,
    /// Missing magic, corrupt metadata, or an index outside the stripe
    BadHeader,
    /// Metadata is intact but the payload checksum fails
    BadChecksum,
    /// Produced by a different backend or an incompatible version
    WrongBackend,
}

/// Result of verifying a stripe's fragments against an instance.
#[derive(Debug, Clone)]
pub struct StripeReport {
    pub fragments: Vec<FragmentStatus>,
}

impl StripeReport {
    pub fn all_ok(&self) -> bool {
        self.fragments.iter().all(|s| *s == FragmentStatus::Ok)
    }
}

/// Verify each fragment of a stripe: header integrity, payload checksum,
/// and that this instance's backend produced it.
pub fn verify_stripe_metadata(desc: InstanceDesc, fragments: &[&[u8]]) -> Result<StripeReport> {
    with_instance(desc, |instance| {
        if fragments.is_empty() {
            return Err(Error::InvalidParams("no fragments supplied".to_string()));
        }
        let n = instance.args.num_fragments();
        let statuses = fragments
            .iter()
            .map(|frag| match header::read_metadata(frag) {
                Err(_) => FragmentStatus::BadHeader,
                Ok(meta) if meta.idx as usize >= n => FragmentStatus::BadHeader,
                Ok(meta) if meta.backend_id != instance.id as u8 => FragmentStatus::WrongBackend,
                Ok(meta) if !instance.backend.is_compatible_with(meta.backend_version) => {
                    FragmentStatus::WrongBackend
                }
                Ok(meta) if meta.chksum_mismatch => FragmentStatus::BadChecksum,
                Ok(_) => FragmentStatus::Ok,
            })
            .collect();
        Ok(StripeReport {
            fragments: statuses,
        })
    })
}

// =============================================================================
// Geometry helpers
// =============================================================================

/// Payload length after alignment padding, for a given original length.
pub fn get_aligned_data_size(desc: InstanceDesc, data_len: u64) -> Result<u64> {
    with_instance(desc, |instance| {
        if data_len == 0 {
            return Err(Error::InvalidParams("data length must be non-zero".to_string()));
        }
        Ok(preprocessing::aligned_data_size(
            instance.args.k,
            instance.backend.element_size(),
            data_len,
        ))
    })
}

/// Smallest payload the instance can encode (one alignment quantum).
pub fn get_minimum_encode_size(desc: InstanceDesc) -> Result<u64> {
    get_aligned_data_size(desc, 1)
}

/// On-wire fragment length for a payload of `data_len` bytes.
pub fn get_fragment_size(desc: InstanceDesc, data_len: u64) -> Result<u64> {
    with_instance(desc, |instance| {
        if data_len == 0 {
            return Err(Error::InvalidParams("data length must be non-zero".to_string()));
        }
        let aligned = preprocessing::aligned_data_size(
            instance.args.k,
            instance.backend.element_size(),
            data_len,
        );
        let blocksize = aligned / instance.args.k as u64;
        let backend_meta = instance.backend.descriptor().backend_metadata_size as u64;
        Ok(HEADER_SIZE as u64 + blocksize + backend_meta)
    })
}
