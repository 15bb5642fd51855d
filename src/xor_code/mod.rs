//! Flat-XOR HD code kernel
//!
//! Parity shards are XORs of data-shard subsets chosen so the code reaches
//! hamming distance 3 or 4: any `hd - 1` losses are recoverable. Coverage is
//! described by the pre-tabulated bitmaps in [`defs`]; decode walks the
//! failure pattern down to repeated single-shard repairs via "connected"
//! parities (a surviving parity covering exactly one missing data shard).

mod defs;
mod planner;

use tracing::debug;

use crate::error::{Error, Result};
use crate::fragment::Fragment;

// =============================================================================
// Failure patterns
// =============================================================================

/// Classification of a missing-fragment set by data/parity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailurePattern {
    NoneMissing,
    OneData,
    TwoData,
    ThreeData,
    OneDataOneParity,
    OneDataTwoParity,
    TwoDataOneParity,
    OneParity,
    TwoParity,
    ThreeParity,
    /// At or beyond the hamming distance; unrecoverable
    GeHd,
}

// =============================================================================
// Buffer XOR
// =============================================================================

/// `dst ^= src`, word-at-a-time with a byte tail.
fn xor_bufs_and_store(src: &[u8], dst: &mut [u8]) {
    let words = src.len() / 8 * 8;
    let (src_words, src_tail) = src.split_at(words);
    let (dst_words, dst_tail) = dst.split_at_mut(words);
    for (d, s) in dst_words.chunks_exact_mut(8).zip(src_words.chunks_exact(8)) {
        let x = u64::from_ne_bytes(d[..8].try_into().unwrap())
            ^ u64::from_ne_bytes(s[..8].try_into().unwrap());
        d.copy_from_slice(&x.to_ne_bytes());
    }
    for (d, s) in dst_tail.iter_mut().zip(src_tail.iter()) {
        *d ^= s;
    }
}

// =============================================================================
// Code descriptor
// =============================================================================

/// One flat-XOR code shape with its coverage bitmaps.
#[derive(Debug)]
pub(crate) struct XorCode {
    pub k: usize,
    pub m: usize,
    pub hd: usize,
    parity_bms: &'static [u32],
    data_bms: &'static [u32],
}

impl XorCode {
    /// Look up the tabulated code for `(k, m, hd)`.
    pub fn new(k: usize, m: usize, hd: usize) -> Result<Self> {
        let (parity_bms, data_bms) = defs::bitmaps(k, m, hd).ok_or_else(|| {
            Error::InvalidParams(format!(
                "no flat-XOR code tabulated for k={}, m={}, hd={}",
                k, m, hd
            ))
        })?;
        Ok(Self {
            k,
            m,
            hd,
            parity_bms,
            data_bms,
        })
    }

    #[inline]
    fn data_in_parity(&self, data_idx: usize, parity: usize) -> bool {
        self.parity_bms[parity] >> data_idx & 1 == 1
    }

    fn parity_bm(&self, parity: usize) -> u32 {
        self.parity_bms[parity]
    }

    /// Split an absolute missing-index list into data and parity halves.
    fn split_missing(&self, missing: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let data = missing.iter().copied().filter(|&i| i < self.k).collect();
        let parity = missing.iter().copied().filter(|&i| i >= self.k).collect();
        (data, parity)
    }

    /// Classify a missing-index list; anything at or past `hd` failures is
    /// unrecoverable.
    pub(crate) fn classify(&self, missing: &[usize]) -> FailurePattern {
        let d = missing.iter().filter(|&&i| i < self.k).count();
        let p = missing.len() - d;
        if d + p >= self.hd {
            return FailurePattern::GeHd;
        }
        match (d, p) {
            (0, 0) => FailurePattern::NoneMissing,
            (1, 0) => FailurePattern::OneData,
            (2, 0) => FailurePattern::TwoData,
            (3, 0) => FailurePattern::ThreeData,
            (1, 1) => FailurePattern::OneDataOneParity,
            (1, 2) => FailurePattern::OneDataTwoParity,
            (2, 1) => FailurePattern::TwoDataOneParity,
            (0, 1) => FailurePattern::OneParity,
            (0, 2) => FailurePattern::TwoParity,
            (0, 3) => FailurePattern::ThreeParity,
            _ => FailurePattern::GeHd,
        }
    }

    /// Number of entries of `missing_data` covered by parity `parity`
    /// (relative index).
    fn num_missing_data_in_parity(
        &self,
        parity: usize,
        missing_data: &[usize],
    ) -> usize {
        missing_data
            .iter()
            .filter(|&&d| self.data_bms[d] >> parity & 1 == 1)
            .count()
    }

    /// Find a surviving parity "connected" to `data_index`: it covers the
    /// shard, covers no other missing data shard, and is not itself missing.
    /// Returns the relative parity index.
    fn connected_parity(
        &self,
        data_index: usize,
        missing_parity: &[usize],
        missing_data: &[usize],
    ) -> Option<usize> {
        (0..self.m).find(|&p| {
            self.num_missing_data_in_parity(p, missing_data) <= 1
                && self.data_in_parity(data_index, p)
                && !missing_parity.contains(&(self.k + p))
        })
    }

    // =========================================================================
    // Encode
    // =========================================================================

    /// XOR every data shard into each parity covering it. Parity buffers
    /// must start zero-filled.
    pub fn encode(&self, data: &[Fragment], parity: &mut [Fragment], blocksize: usize) {
        for (i, shard) in data.iter().enumerate() {
            for (p, out) in parity.iter_mut().enumerate() {
                if self.data_in_parity(i, p) {
                    xor_bufs_and_store(
                        &shard.payload()[..blocksize],
                        &mut out.payload_mut()[..blocksize],
                    );
                }
            }
        }
    }

    /// Re-encode only the parities listed (by absolute index) in
    /// `missing_parity`. Their buffers must start zero-filled.
    fn selective_encode(
        &self,
        data: &[Fragment],
        parity: &mut [Fragment],
        missing_parity: &[usize],
        blocksize: usize,
    ) {
        for (i, shard) in data.iter().enumerate() {
            for &mp in missing_parity {
                let p = mp - self.k;
                if self.data_in_parity(i, p) {
                    xor_bufs_and_store(
                        &shard.payload()[..blocksize],
                        &mut parity[p].payload_mut()[..blocksize],
                    );
                }
            }
        }
    }

    // =========================================================================
    // Decode
    // =========================================================================

    /// Rebuild `data[target]` from `parity_src` (a parity payload with
    /// coverage `parity_bm`) by XORing in every other covered data shard.
    fn recover_data_via_parity(
        &self,
        data: &mut [Fragment],
        parity_src: &[u8],
        parity_bm: u32,
        target: usize,
        blocksize: usize,
    ) {
        let mut dst = std::mem::take(&mut data[target]);
        {
            let out = &mut dst.payload_mut()[..blocksize];
            out.copy_from_slice(parity_src);
            for (i, shard) in data.iter().enumerate() {
                if i != target && parity_bm >> i & 1 == 1 {
                    xor_bufs_and_store(&shard.payload()[..blocksize], out);
                }
            }
        }
        data[target] = dst;
    }

    fn decode_one_data(
        &self,
        data: &mut [Fragment],
        parity: &[Fragment],
        missing_data: &[usize],
        missing_parity: &[usize],
        blocksize: usize,
    ) -> Result<()> {
        let target = missing_data[0];
        let p = self
            .connected_parity(target, missing_parity, missing_data)
            .ok_or(Error::InsufficientFragments {
                available: self.k + self.m - missing_data.len() - missing_parity.len(),
                required: self.k,
            })?;
        self.recover_data_via_parity(
            data,
            &parity[p].payload()[..blocksize],
            self.parity_bms[p],
            target,
            blocksize,
        );
        Ok(())
    }

    fn decode_two_data(
        &self,
        data: &mut [Fragment],
        parity: &[Fragment],
        missing_data: &[usize],
        missing_parity: &[usize],
        blocksize: usize,
    ) -> Result<()> {
        let (target, remaining) = if self
            .connected_parity(missing_data[0], missing_parity, missing_data)
            .is_some()
        {
            (missing_data[0], missing_data[1])
        } else {
            (missing_data[1], missing_data[0])
        };
        let p = self
            .connected_parity(target, missing_parity, missing_data)
            .ok_or(Error::InsufficientFragments {
                available: self.k + self.m - missing_data.len() - missing_parity.len(),
                required: self.k,
            })?;

        self.recover_data_via_parity(
            data,
            &parity[p].payload()[..blocksize],
            self.parity_bms[p],
            target,
            blocksize,
        );
        self.decode_one_data(data, parity, &[remaining], missing_parity, blocksize)
    }

    fn decode_three_data(
        &self,
        data: &mut [Fragment],
        parity: &[Fragment],
        missing_data: &[usize],
        missing_parity: &[usize],
        blocksize: usize,
    ) -> Result<()> {
        // Prefer a parity covering exactly one of the three missing shards.
        let direct = missing_data.iter().find_map(|&d| {
            self.connected_parity(d, missing_parity, missing_data)
                .map(|p| (d, p))
        });

        let (target, parity_bm, parity_src) = match direct {
            Some((d, p)) => (d, self.parity_bms[p], parity[p].payload()[..blocksize].to_vec()),
            None => {
                // Find a parity pair covering exactly 2 (P) and exactly 3 (Q)
                // of the missing shards; P ^ Q covers exactly one.
                let mut contains_2d = None;
                let mut contains_3d = None;
                for p in 0..self.m {
                    match self.num_missing_data_in_parity(p, missing_data) {
                        2 if contains_2d.is_none() => contains_2d = Some(p),
                        3 if contains_3d.is_none() => contains_3d = Some(p),
                        _ => {}
                    }
                }
                let (c2, c3) = match (contains_2d, contains_3d) {
                    (Some(c2), Some(c3)) => (c2, c3),
                    _ => {
                        return Err(Error::InsufficientFragments {
                            available: self.k + self.m - missing_data.len(),
                            required: self.k,
                        })
                    }
                };

                let bm = self.parity_bms[c2] ^ self.parity_bms[c3];
                let target = missing_data
                    .iter()
                    .copied()
                    .find(|&d| bm >> d & 1 == 1)
                    .ok_or(Error::InsufficientFragments {
                        available: self.k + self.m - missing_data.len(),
                        required: self.k,
                    })?;

                // Synthetic parity P ^ Q in an aligned scratch buffer
                let mut synthetic = Fragment::alloc_raw(blocksize);
                synthetic
                    .as_mut_bytes()
                    .copy_from_slice(&parity[c2].payload()[..blocksize]);
                xor_bufs_and_store(&parity[c3].payload()[..blocksize], synthetic.as_mut_bytes());
                (target, bm, synthetic.as_bytes().to_vec())
            }
        };

        self.recover_data_via_parity(data, &parity_src, parity_bm, target, blocksize);

        let remaining: Vec<usize> = missing_data
            .iter()
            .copied()
            .filter(|&d| d != target)
            .collect();
        self.decode_two_data(data, parity, &remaining, missing_parity, blocksize)
    }

    /// Recover every missing shard reachable for the classified failure
    /// pattern; parity rebuild happens only when `decode_parity` is set.
    pub fn decode(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        blocksize: usize,
        decode_parity: bool,
    ) -> Result<()> {
        let pattern = self.classify(missing);
        let (missing_data, missing_parity) = self.split_missing(missing);
        debug!(?pattern, "flat-xor decode");

        match pattern {
            FailurePattern::NoneMissing => {}
            FailurePattern::OneData => {
                self.decode_one_data(data, parity, &missing_data, &[], blocksize)?;
            }
            FailurePattern::TwoData => {
                self.decode_two_data(data, parity, &missing_data, &[], blocksize)?;
            }
            FailurePattern::ThreeData => {
                self.decode_three_data(data, parity, &missing_data, &[], blocksize)?;
            }
            FailurePattern::OneDataOneParity | FailurePattern::OneDataTwoParity => {
                self.decode_one_data(data, parity, &missing_data, &missing_parity, blocksize)?;
                if decode_parity {
                    self.selective_encode(data, parity, &missing_parity, blocksize);
                }
            }
            FailurePattern::TwoDataOneParity => {
                self.decode_two_data(data, parity, &missing_data, &missing_parity, blocksize)?;
                if decode_parity {
                    self.selective_encode(data, parity, &missing_parity, blocksize);
                }
            }
            FailurePattern::OneParity | FailurePattern::TwoParity | FailurePattern::ThreeParity => {
                if decode_parity {
                    self.selective_encode(data, parity, &missing_parity, blocksize);
                }
            }
            FailurePattern::GeHd => {
                return Err(Error::InsufficientFragments {
                    available: self.k + self.m - missing.len(),
                    required: self.k + self.m - (self.hd - 1),
                });
            }
        }
        Ok(())
    }

    /// Rebuild the single shard at `target`, using a cheap one-parity repair
    /// when the coverage allows it and falling back to a full decode
    /// otherwise.
    pub fn reconstruct_one(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        target: usize,
        blocksize: usize,
    ) -> Result<()> {
        let (missing_data, missing_parity) = self.split_missing(missing);

        if target < self.k {
            if let Some(p) = self.connected_parity(target, &missing_parity, &missing_data) {
                self.recover_data_via_parity(
                    data,
                    &parity[p].payload()[..blocksize],
                    self.parity_bms[p],
                    target,
                    blocksize,
                );
                return Ok(());
            }
            return self.decode(data, parity, missing, blocksize, true);
        }

        let p = target - self.k;
        if self.num_missing_data_in_parity(p, &missing_data) == 0 {
            let mut dst = std::mem::take(&mut parity[p]);
            {
                let out = &mut dst.payload_mut()[..blocksize];
                out.fill(0);
                for (i, shard) in data.iter().enumerate() {
                    if self.data_in_parity(i, p) {
                        xor_bufs_and_store(&shard.payload()[..blocksize], out);
                    }
                }
            }
            parity[p] = dst;
            return Ok(());
        }
        self.decode(data, parity, missing, blocksize, true)
    }

    /// Minimal fragment set sufficient to rebuild `to_reconstruct` without
    /// touching `to_exclude`.
    pub fn fragments_needed(
        &self,
        to_reconstruct: &[usize],
        to_exclude: &[usize],
    ) -> Result<Vec<usize>> {
        planner::fragments_needed(self, to_reconstruct, to_exclude)
    }
}
