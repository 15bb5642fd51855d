//! Flat-XOR HD backend
//!
//! Wraps the bitmap-code kernel in [`crate::xor_code`]. Only the tabulated
//! `(k, m, hd)` family is accepted; the word size is fixed at 32 bits.

use crate::args::{BackendId, EcArgs};
use crate::backend::{backend_version, BackendDescriptor, CodingBackend};
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::xor_code::XorCode;

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    id: BackendId::FlatXorHd,
    name: "flat_xor_hd",
    version: backend_version(1, 0, 0),
    backend_metadata_size: 0,
    is_systematic: true,
};

const DEFAULT_W: usize = 32;

#[derive(Debug)]
pub(crate) struct FlatXorBackend {
    code: XorCode,
}

impl FlatXorBackend {
    pub fn new(args: &EcArgs) -> Result<Self> {
        args.validate()?;
        if args.w != 0 && args.w != DEFAULT_W {
            return Err(Error::InvalidParams(format!(
                "flat-XOR codes are fixed at w = {}, got w = {}",
                DEFAULT_W, args.w
            )));
        }
        if args.hd != 3 && args.hd != 4 {
            return Err(Error::InvalidParams(format!(
                "flat-XOR hamming distance must be 3 or 4, got {}",
                args.hd
            )));
        }
        let code = XorCode::new(args.k, args.m, args.hd)?;
        Ok(Self { code })
    }
}

impl CodingBackend for FlatXorBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    fn element_size(&self) -> usize {
        DEFAULT_W
    }

    fn encode(&self, data: &[Fragment], parity: &mut [Fragment], blocksize: usize) -> Result<()> {
        self.code.encode(data, parity, blocksize);
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
        self.code
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
        self.code
            .reconstruct_one(data, parity, missing, destination, blocksize)
    }

    fn min_fragments(&self, missing: &[usize], exclude: &[usize]) -> Result<Vec<usize>> {
        self.code.fragments_needed(missing, exclude)
    }
}
