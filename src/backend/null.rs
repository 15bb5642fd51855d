//! Null (passthrough) backend
//!
//! Computes nothing and succeeds at everything; the frontend pipeline still
//! splits, pads, stamps and validates fragments around it, which makes this
//! backend the reference harness for the fragment protocol itself.

use crate::args::{BackendId, EcArgs};
use crate::backend::{backend_version, BackendDescriptor, CodingBackend};
use crate::error::Result;
use crate::fragment::Fragment;

const DESCRIPTOR: BackendDescriptor = BackendDescriptor {
    id: BackendId::Null,
    name: "null",
    version: backend_version(1, 0, 0),
    backend_metadata_size: 0,
    is_systematic: true,
};

const DEFAULT_W: usize = 32;

#[derive(Debug)]
pub(crate) struct NullBackend {
    k: usize,
    n: usize,
}

impl NullBackend {
    pub fn new(args: &EcArgs) -> Result<Self> {
        args.validate()?;
        Ok(Self {
            k: args.k,
            n: args.k + args.m,
        })
    }
}

impl CodingBackend for NullBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &DESCRIPTOR
    }

    fn element_size(&self) -> usize {
        DEFAULT_W
    }

    fn encode(&self, _data: &[Fragment], _parity: &mut [Fragment], _blocksize: usize) -> Result<()> {
        Ok(())
    }

    fn decode(
        &self,
        _data: &mut [Fragment],
        _parity: &mut [Fragment],
        _missing: &[usize],
        _blocksize: usize,
        _rebuild_parity: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn reconstruct(
        &self,
        _data: &mut [Fragment],
        _parity: &mut [Fragment],
        _missing: &[usize],
        _destination: usize,
        _blocksize: usize,
    ) -> Result<()> {
        Ok(())
    }

    fn min_fragments(&self, missing: &[usize], exclude: &[usize]) -> Result<Vec<usize>> {
        // Same first-k scan the real codes use; harmless for a passthrough.
        let unavailable: Vec<usize> = missing.iter().chain(exclude.iter()).copied().collect();
        Ok((0..self.n)
            .filter(|i| !unavailable.contains(i))
            .take(self.k)
            .collect())
    }
}
