//! Code parameters and backend identification
//!
//! [`EcArgs`] carries the `(k, m, w, hd)` tuple plus the fragment checksum
//! type. Backend-specific arguments are a sum type keyed by [`BackendId`]
//! instead of an opaque pointer, so invalid combinations are unrepresentable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hard cap on the number of fragments in a stripe (`k + m`).
pub const MAX_FRAGMENTS: usize = 32;

// =============================================================================
// Backend Identification
// =============================================================================

/// Numeric identifiers of the supported coding backends.
///
/// The values are part of the on-disk fragment format (stored in the header's
/// `backend_id` byte) and must never be renumbered. Backends whose kernels are
/// not linked into this build are still declared here so their fragments can
/// be identified; creating an instance of one fails with
/// [`Error::BackendNotAvailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BackendId {
    Null = 0,
    JerasureRsVand = 1,
    JerasureRsCauchy = 2,
    FlatXorHd = 3,
    IsaLRsVand = 4,
    Shss = 5,
    LiberasurecodeRsVand = 6,
    IsaLRsCauchy = 7,
    Libphazr = 8,
    IsaLRsVandInv = 9,
}

impl BackendId {
    /// Short name, as used by name-based lookup
    pub fn name(&self) -> &'static str {
        match self {
            BackendId::Null => "null",
            BackendId::JerasureRsVand => "jerasure_rs_vand",
            BackendId::JerasureRsCauchy => "jerasure_rs_cauchy",
            BackendId::FlatXorHd => "flat_xor_hd",
            BackendId::IsaLRsVand => "isa_l_rs_vand",
            BackendId::Shss => "shss",
            BackendId::LiberasurecodeRsVand => "liberasurecode_rs_vand",
            BackendId::IsaLRsCauchy => "isa_l_rs_cauchy",
            BackendId::Libphazr => "libphazr",
            BackendId::IsaLRsVandInv => "isa_l_rs_vand_inv",
        }
    }

    /// Resolve a backend id from its on-disk byte value
    pub fn from_u8(id: u8) -> Result<Self> {
        Ok(match id {
            0 => BackendId::Null,
            1 => BackendId::JerasureRsVand,
            2 => BackendId::JerasureRsCauchy,
            3 => BackendId::FlatXorHd,
            4 => BackendId::IsaLRsVand,
            5 => BackendId::Shss,
            6 => BackendId::LiberasurecodeRsVand,
            7 => BackendId::IsaLRsCauchy,
            8 => BackendId::Libphazr,
            9 => BackendId::IsaLRsVandInv,
            other => {
                return Err(Error::BackendNotSupported(format!(
                    "unknown backend id {}",
                    other
                )))
            }
        })
    }

    /// Resolve a backend id from its short name
    pub fn from_name(name: &str) -> Result<Self> {
        for id in [
            BackendId::Null,
            BackendId::JerasureRsVand,
            BackendId::JerasureRsCauchy,
            BackendId::FlatXorHd,
            BackendId::IsaLRsVand,
            BackendId::Shss,
            BackendId::LiberasurecodeRsVand,
            BackendId::IsaLRsCauchy,
            BackendId::Libphazr,
            BackendId::IsaLRsVandInv,
        ] {
            if id.name() == name {
                return Ok(id);
            }
        }
        Err(Error::BackendNotSupported(format!(
            "unknown backend name '{}'",
            name
        )))
    }
}

// =============================================================================
// Checksum Type
// =============================================================================

/// Checksum algorithms supported for fragment payloads.
///
/// The discriminants are stored in the fragment header's `chksum_type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChecksumType {
    /// No payload checksum
    #[default]
    None = 1,
    /// CRC32 (IEEE) over the payload region
    Crc32 = 2,
    /// Reserved; never computed by this library
    Md5 = 3,
}

impl ChecksumType {
    /// Resolve a checksum type from its on-disk byte value
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            1 => ChecksumType::None,
            2 => ChecksumType::Crc32,
            3 => ChecksumType::Md5,
            other => {
                return Err(Error::BadHeader(format!(
                    "unknown checksum type {}",
                    other
                )))
            }
        })
    }
}

// =============================================================================
// Backend-specific Arguments
// =============================================================================

/// Backend-specific arguments, keyed by backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendArgs {
    /// No backend-specific arguments
    #[default]
    None,
    /// Arguments for the null backend (sample arg, ignored)
    Null { arg1: u64 },
    /// Arguments for the shss backend (not linked in this build)
    Shss { aes_bits: u32 },
}

// =============================================================================
// EC Arguments
// =============================================================================

/// Code parameters passed to `instance_create`.
///
/// `w` and `hd` may be left at zero; backends that fix them (the built-in
/// Reed-Solomon kernel fixes `w = 16`, flat-XOR fixes `w = 32`) write the
/// effective value back into the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcArgs {
    /// Number of data fragments
    pub k: usize,
    /// Number of parity fragments
    pub m: usize,
    /// Word size in bits (0 = backend default)
    pub w: usize,
    /// Hamming distance (flat-XOR codes only; = m for Reed-Solomon)
    pub hd: usize,
    /// Fragment payload checksum type
    pub ct: ChecksumType,
    /// Backend-specific arguments
    pub backend_args: BackendArgs,
}

impl Default for EcArgs {
    fn default() -> Self {
        Self {
            k: 0,
            m: 0,
            w: 0,
            hd: 0,
            ct: ChecksumType::None,
            backend_args: BackendArgs::None,
        }
    }
}

impl EcArgs {
    /// Shorthand for the common case: `k` data, `m` parity, backend defaults
    pub fn new(k: usize, m: usize) -> Self {
        Self {
            k,
            m,
            ..Default::default()
        }
    }

    /// Total number of fragments in a stripe
    pub fn num_fragments(&self) -> usize {
        self.k + self.m
    }

    /// Validate the parameters common to all backends.
    ///
    /// Per-backend constraints (word size, tabulated `(k, m, hd)` families)
    /// are enforced by the backend factories on top of this.
    pub fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(Error::InvalidParams("k must be at least 1".to_string()));
        }
        if self.m < 1 {
            return Err(Error::InvalidParams("m must be at least 1".to_string()));
        }
        if self.k + self.m > MAX_FRAGMENTS {
            return Err(Error::InvalidParams(format!(
                "k + m = {} exceeds the fragment limit of {}",
                self.k + self.m,
                MAX_FRAGMENTS
            )));
        }
        if self.w > 0 && self.w < 64 && self.k + self.m > (1usize << self.w) {
            return Err(Error::InvalidParams(format!(
                "k + m = {} exceeds 2^w for w = {}",
                self.k + self.m,
                self.w
            )));
        }
        Ok(())
    }
}
