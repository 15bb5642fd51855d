//! Built-in Reed-Solomon backend
//!
//! Wraps the portable Vandermonde kernel in [`crate::rs_vand`]. The word
//! size is hard-coded at 16 bits; users wanting tuned field arithmetic are
//! expected to link one of the external accelerated backends instead.

use crate::args::{BackendId, EcArgs};
use crate::backend::{backend_version, BackendDescriptor, CodingBackend};
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::rs_vand::RsVand;

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    id: BackendId::LiberasurecodeRsVand,
    name: "liberasurecode_rs_vand",
    version: backend_version(1, 0, 0),
    backend_metadata_size: 0,
    is_systematic: true,
};

const FIXED_W: usize = 16;

#[derive(Debug)]
pub(crate) struct RsVandBackend {
    kernel: RsVand,
}

impl RsVandBackend {
    pub fn new(args: &EcArgs) -> Result<Self> {
        args.validate()?;
        if args.w != 0 && args.w != FIXED_W {
            return Err(Error::InvalidParams(format!(
                "the built-in reed-solomon kernel is fixed at w = {}, got w = {}",
                FIXED_W, args.w
            )));
        }
        let kernel = RsVand::new(args.k, args.m)?;
        Ok(Self { kernel })
    }
}

impl CodingBackend for RsVandBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    fn element_size(&self) -> usize {
        FIXED_W
    }

    fn encode(&self, data: &[Fragment], parity: &mut [Fragment], blocksize: usize) -> Result<()> {
        self.kernel.encode(data, parity, blocksize);
        Ok(())
    }

    fn decode(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        blocksize: usize,
        rebuild_parity: bool,
    ) -> Result<()> {
        self.kernel
            .decode(data, parity, missing, blocksize, rebuild_parity)
    }

    fn reconstruct(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        destination: usize,
        blocksize: usize,
    ) -> Result<()> {
        self.kernel
            .reconstruct(data, parity, missing, destination, blocksize)
    }

    fn min_fragments(&self, missing: &[usize], exclude: &[usize]) -> Result<Vec<usize>> {
        self.kernel.min_fragments(missing, exclude)
    }
}
