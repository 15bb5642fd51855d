//! Built-in systematic Vandermonde Reed-Solomon kernel over GF(2^16)
//!
//! A deliberately portable kernel: no architecture assumptions beyond
//! little-endian word access, table-driven field arithmetic, and the region
//! operations below. Parity `p` is the GF dot product of the data shards
//! with generator row `k + p`; decoding inverts the survivor submatrix.

mod matrix;

use tracing::debug;

use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::gf::gf16;

use matrix::Matrix;

// =============================================================================
// Region arithmetic
// =============================================================================

/// `dst ^= src`, 32-bit words with a byte tail.
pub(crate) fn region_xor(src: &[u8], dst: &mut [u8]) {
    let words = src.len() / 4 * 4;
    let (src_words, src_tail) = src.split_at(words);
    let (dst_words, dst_tail) = dst.split_at_mut(words);
    for (d, s) in dst_words.chunks_exact_mut(4).zip(src_words.chunks_exact(4)) {
        let x = u32::from_ne_bytes(d[..4].try_into().unwrap())
            ^ u32::from_ne_bytes(s[..4].try_into().unwrap());
        d.copy_from_slice(&x.to_ne_bytes());
    }
    for (d, s) in dst_tail.iter_mut().zip(src_tail.iter()) {
        *d ^= s;
    }
}

/// `dst (^)= c * src` over GF(2^16), 16-bit little-endian words with a
/// single-byte tail for odd lengths.
pub(crate) fn region_multiply(src: &[u8], dst: &mut [u8], c: u32, accumulate: bool) {
    let words = src.len() / 2 * 2;
    for (d, s) in dst[..words]
        .chunks_exact_mut(2)
        .zip(src[..words].chunks_exact(2))
    {
        let v = u16::from_le_bytes([s[0], s[1]]) as u32;
        let prod = gf16::mult(v, c) as u16;
        if accumulate {
            let cur = u16::from_le_bytes([d[0], d[1]]);
            d.copy_from_slice(&(cur ^ prod).to_le_bytes());
        } else {
            d.copy_from_slice(&prod.to_le_bytes());
        }
    }
    if src.len() % 2 == 1 {
        let i = src.len() - 1;
        let prod = gf16::mult(src[i] as u32, c) as u8;
        if accumulate {
            dst[i] ^= prod;
        } else {
            dst[i] = prod;
        }
    }
}

/// `dst = row . srcs`: zero `dst`, then fold in each source, XORing directly
/// when its coefficient is 1 and multiply-accumulating otherwise.
pub(crate) fn region_dot_product(srcs: &[&[u8]], dst: &mut [u8], row: &[u32]) {
    dst.fill(0);
    for (src, &coeff) in srcs.iter().zip(row.iter()) {
        if coeff == 0 {
            continue;
        }
        if coeff == 1 {
            region_xor(src, dst);
        } else {
            region_multiply(src, dst, coeff, true);
        }
    }
}

// =============================================================================
// Kernel
// =============================================================================

/// Reed-Solomon kernel state: the systematic generator matrix for `(k, m)`.
#[derive(Debug)]
pub(crate) struct RsVand {
    k: usize,
    m: usize,
    gen: Matrix,
}

impl RsVand {
    pub fn new(k: usize, m: usize) -> Result<Self> {
        if k + m > 1 << 16 {
            return Err(Error::InvalidParams(format!(
                "k + m = {} exceeds the GF(2^16) field",
                k + m
            )));
        }
        let gen = matrix::make_systematic_matrix(k, m)?;
        Ok(Self { k, m, gen })
    }

    fn missing_bitmap(&self, missing: &[usize]) -> Result<Vec<bool>> {
        let n = self.k + self.m;
        let mut bitmap = vec![false; n];
        for &idx in missing {
            if idx >= n {
                return Err(Error::InvalidParams(format!(
                    "missing index {} out of range for {} fragments",
                    idx, n
                )));
            }
            bitmap[idx] = true;
        }
        Ok(bitmap)
    }

    /// First `k` available fragment indices, in index order.
    fn survivor_set(&self, missing: &[bool]) -> Vec<usize> {
        (0..self.k + self.m)
            .filter(|&i| !missing[i])
            .take(self.k)
            .collect()
    }

    fn payload_of<'a>(
        &self,
        data: &'a [Fragment],
        parity: &'a [Fragment],
        idx: usize,
        blocksize: usize,
    ) -> &'a [u8] {
        if idx < self.k {
            &data[idx].payload()[..blocksize]
        } else {
            &parity[idx - self.k].payload()[..blocksize]
        }
    }

    /// Compute all `m` parity shards from the `k` data shards.
    pub fn encode(&self, data: &[Fragment], parity: &mut [Fragment], blocksize: usize) {
        for p in 0..self.m {
            let srcs: Vec<&[u8]> = data.iter().map(|f| &f.payload()[..blocksize]).collect();
            let row = self.gen.row(self.k + p);
            region_dot_product(&srcs, &mut parity[p].payload_mut()[..blocksize], row);
        }
    }

    /// Recover every missing data shard; optionally rebuild missing parity.
    pub fn decode(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        blocksize: usize,
        rebuild_parity: bool,
    ) -> Result<()> {
        let bitmap = self.missing_bitmap(missing)?;
        let num_missing = bitmap.iter().filter(|&&b| b).count();
        if num_missing > self.m {
            return Err(Error::InsufficientFragments {
                available: self.k + self.m - num_missing,
                required: self.k,
            });
        }

        let survivors = self.survivor_set(&bitmap);
        let mut dec = matrix::create_decoding_matrix(&self.gen, &bitmap, self.k)?;
        let inverse = matrix::gaussj_inversion(&mut dec)?;

        for i in 0..self.k {
            if !bitmap[i] {
                continue;
            }
            let mut dst = std::mem::take(&mut data[i]);
            {
                let data_ref: &[Fragment] = data;
                let parity_ref: &[Fragment] = parity;
                let srcs: Vec<&[u8]> = survivors
                    .iter()
                    .map(|&s| self.payload_of(data_ref, parity_ref, s, blocksize))
                    .collect();
                region_dot_product(
                    &srcs,
                    &mut dst.payload_mut()[..blocksize],
                    inverse.row(i),
                );
            }
            data[i] = dst;
        }

        if rebuild_parity {
            for p in 0..self.m {
                if !bitmap[self.k + p] {
                    continue;
                }
                let srcs: Vec<&[u8]> =
                    data.iter().map(|f| &f.payload()[..blocksize]).collect();
                let row = self.gen.row(self.k + p);
                region_dot_product(&srcs, &mut parity[p].payload_mut()[..blocksize], row);
            }
        }

        debug!(missing = num_missing, "reed-solomon decode complete");
        Ok(())
    }

    /// Rebuild the single shard at `destination`.
    pub fn reconstruct(
        &self,
        data: &mut [Fragment],
        parity: &mut [Fragment],
        missing: &[usize],
        destination: usize,
        blocksize: usize,
    ) -> Result<()> {
        let bitmap = self.missing_bitmap(missing)?;
        let num_missing = bitmap.iter().filter(|&&b| b).count();
        if num_missing > self.m {
            return Err(Error::InsufficientFragments {
                available: self.k + self.m - num_missing,
                required: self.k,
            });
        }

        let survivors = self.survivor_set(&bitmap);
        let mut dec = matrix::create_decoding_matrix(&self.gen, &bitmap, self.k)?;
        let inverse = matrix::gaussj_inversion(&mut dec)?;

        if destination < self.k {
            let mut dst = std::mem::take(&mut data[destination]);
            {
                let data_ref: &[Fragment] = data;
                let parity_ref: &[Fragment] = parity;
                let srcs: Vec<&[u8]> = survivors
                    .iter()
                    .map(|&s| self.payload_of(data_ref, parity_ref, s, blocksize))
                    .collect();
                region_dot_product(
                    &srcs,
                    &mut dst.payload_mut()[..blocksize],
                    inverse.row(destination),
                );
            }
            data[destination] = dst;
        } else {
            // Substitute the decode equations of the missing data shards into
            // the destination's generator row so the dot product runs over
            // the survivor set directly.
            let mut parity_row = vec![0u32; self.k];
            let mut j = 0;
            for i in 0..self.k {
                if !bitmap[i] {
                    parity_row[j] = self.gen.get(destination, i);
                    j += 1;
                }
            }
            for &mi in missing {
                if mi < self.k {
                    let coeff = self.gen.get(destination, mi);
                    for (slot, inv) in parity_row.iter_mut().zip(inverse.row(mi).iter()) {
                        *slot ^= gf16::mult(coeff, *inv);
                    }
                }
            }

            let mut dst = std::mem::take(&mut parity[destination - self.k]);
            {
                let data_ref: &[Fragment] = data;
                let parity_ref: &[Fragment] = parity;
                let srcs: Vec<&[u8]> = survivors
                    .iter()
                    .map(|&s| self.payload_of(data_ref, parity_ref, s, blocksize))
                    .collect();
                region_dot_product(&srcs, &mut dst.payload_mut()[..blocksize], &parity_row);
            }
            parity[destination - self.k] = dst;
        }

        Ok(())
    }

    /// The first `k` fragments outside `missing` and `exclude`, in index
    /// order; any `k` fragments decode an MDS code.
    pub fn min_fragments(&self, missing: &[usize], exclude: &[usize]) -> Result<Vec<usize>> {
        let n = self.k + self.m;
        let mut unavailable = vec![false; n];
        for &idx in missing.iter().chain(exclude.iter()) {
            if idx < n {
                unavailable[idx] = true;
            }
        }
        let needed: Vec<usize> = (0..n).filter(|&i| !unavailable[i]).take(self.k).collect();
        if needed.len() < self.k {
            return Err(Error::InsufficientFragments {
                available: needed.len(),
                required: self.k,
            });
        }
        Ok(needed)
    }
}
