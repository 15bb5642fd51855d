//! Coding backend abstraction
//!
//! Every kernel sits behind [`CodingBackend`], a uniform capability surface
//! the frontend dispatches through. Backends are registered statically and
//! selected at runtime by [`BackendId`]; ids whose kernels live in external
//! shared libraries are declared for on-disk compatibility but report
//! [`Error::BackendNotAvailable`] at instance creation.

pub(crate) mod flat_xor;
pub(crate) mod null;
pub(crate) mod rs_vand;

use crate::args::{BackendId, EcArgs};
use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// Encode a backend semver triple the way fragment headers store it.
pub(crate) const fn backend_version(major: u32, minor: u32, rev: u32) -> u32 {
    (major << 16) | (minor << 8) | rev
}

/// Static attributes of a backend implementation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackendDescriptor {
    pub id: BackendId,
    pub name: &'static str,
    /// Library version stamped into fragment headers
    pub version: u32,
    /// Extra per-fragment bytes the kernel appends after the payload
    pub backend_metadata_size: usize,
    /// Whether the first `k` fragments carry the payload verbatim
    pub is_systematic: bool,
}

/// Uniform capability set required of every coding kernel.
///
/// `init` is the factory in [`create_backend`]; `exit` is `Drop`. All buffer
/// arguments are whole fragments; kernels only touch the payload regions.
pub(crate) trait CodingBackend: Send + Sync + std::fmt::Debug {
    fn descriptor(&self) -> &BackendDescriptor;

    /// Effective word size of the instance, in bits
    fn element_size(&self) -> usize;

    /// Compute the `m` parity payloads from the `k` data payloads
    fn encode(
        &self,
        data: &[Fragment],
        parity: &mut [Fragment],
        blocksize: usize,
    ) -> Result<()>;

    /// Recover the payloads at `missing`; parity is rebuilt only when
    /// `rebuild_parity` is set
    fn decode(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        blocksize: usize,
        rebuild_parity: bool,
    ) -> Result<()>;

    /// Recover the single payload at `destination`
    fn reconstruct(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        destination: usize,
        blocksize: usize,
    ) -> Result<()>;

    /// Minimal fragment set sufficient to rebuild `missing` while reading
    /// none of `exclude`
    fn min_fragments(&self, missing: &[usize], exclude: &[usize]) -> Result<Vec<usize>>;

    /// Whether fragments stamped with `version` can be processed by this
    /// backend build
    fn is_compatible_with(&self, version: u32) -> bool {
        version == self.descriptor().version
    }
}

/// Instantiate the kernel for `id`, validating `args` against its
/// constraints. The returned instance owns its generator tables.
pub(crate) fn create_backend(id: BackendId, args: &EcArgs) -> Result<Box<dyn CodingBackend>> {
    match id {
        BackendId::Null => Ok(Box::new(null::NullBackend::new(args)?)),
        BackendId::LiberasurecodeRsVand => Ok(Box::new(rs_vand::RsVandBackend::new(args)?)),
        BackendId::FlatXorHd => Ok(Box::new(flat_xor::FlatXorBackend::new(args)?)),
        other => Err(Error::BackendNotAvailable(format!(
            "backend '{}' is not linked into this build",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_version_encoding() {
        assert_eq!(backend_version(1, 0, 0), 0x0001_0000);
        assert_eq!(backend_version(1, 2, 3), 0x0001_0203);
    }

    #[test]
    fn test_linked_backends_create() {
        assert!(create_backend(BackendId::Null, &EcArgs::new(4, 2)).is_ok());
        assert!(create_backend(BackendId::LiberasurecodeRsVand, &EcArgs::new(10, 4)).is_ok());
        let mut args = EcArgs::new(10, 5);
        args.hd = 3;
        assert!(create_backend(BackendId::FlatXorHd, &args).is_ok());
    }

    #[test]
    fn test_unlinked_backends_report_unavailable() {
        for id in [
            BackendId::JerasureRsVand,
            BackendId::JerasureRsCauchy,
            BackendId::IsaLRsVand,
            BackendId::Shss,
            BackendId::IsaLRsCauchy,
            BackendId::Libphazr,
            BackendId::IsaLRsVandInv,
        ] {
            assert_matches!(
                create_backend(id, &EcArgs::new(4, 2)),
                Err(Error::BackendNotAvailable(_))
            );
        }
    }
}
