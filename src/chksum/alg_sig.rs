//! Algebraic signatures over GF(2^8) and GF(2^16)
//!
//! A signature is a vector of Horner hashes of the buffer's words, one per
//! multiplier in (1, α, α², α³) with α = 2. Every component is GF(2)-linear
//! in the buffer, so the signature of an XOR of buffers equals the XOR of
//! their signatures; in particular the signatures of a stripe whose parity
//! is the XOR of its data shards XOR to zero. Supported `(gf_w, sig_len)`
//! pairs: (8, 32), (16, 32), (16, 64).

use crate::error::{Error, Result};
use crate::gf::{gf16, gf8};

const ALPHA: u32 = 2;
const BETA: u32 = 4;
const GAMMA: u32 = 8;

/// Tabulated signature engine for one `(gf_w, sig_len)` pair.
#[derive(Debug)]
pub struct AlgSig {
    gf_w: usize,
    sig_len: usize,
    // Split multiplier tables: a GF multiply by a constant is the XOR of a
    // high-half and a low-half lookup.
    tbl1_l: Vec<u16>,
    tbl1_r: Vec<u16>,
    tbl2_l: Vec<u16>,
    tbl2_r: Vec<u16>,
    tbl3_l: Vec<u16>,
    tbl3_r: Vec<u16>,
}

fn build_w16_tables(multiplier: u32) -> (Vec<u16>, Vec<u16>) {
    let mut left = vec![0u16; 256];
    let mut right = vec![0u16; 256];
    for i in 0..256u32 {
        left[i as usize] = gf16::mult(i << 8, multiplier) as u16;
        right[i as usize] = gf16::mult(i, multiplier) as u16;
    }
    (left, right)
}

fn build_w8_tables(multiplier: u32) -> (Vec<u16>, Vec<u16>) {
    let mut left = vec![0u16; 16];
    let mut right = vec![0u16; 16];
    for i in 0..16u32 {
        left[i as usize] = gf8::mult(i << 4, multiplier) as u16;
        right[i as usize] = gf8::mult(i, multiplier) as u16;
    }
    (left, right)
}

impl AlgSig {
    /// Build the signature engine for a signature of `sig_len` bits over
    /// GF(2^`gf_w`).
    pub fn new(sig_len: usize, gf_w: usize) -> Result<Self> {
        match (gf_w, sig_len) {
            (8, 32) => {
                let (tbl1_l, tbl1_r) = build_w8_tables(ALPHA);
                let (tbl2_l, tbl2_r) = build_w8_tables(BETA);
                let (tbl3_l, tbl3_r) = build_w8_tables(GAMMA);
                Ok(Self {
                    gf_w,
                    sig_len,
                    tbl1_l,
                    tbl1_r,
                    tbl2_l,
                    tbl2_r,
                    tbl3_l,
                    tbl3_r,
                })
            }
            (16, 32) => {
                let (tbl1_l, tbl1_r) = build_w16_tables(ALPHA);
                Ok(Self {
                    gf_w,
                    sig_len,
                    tbl1_l,
                    tbl1_r,
                    tbl2_l: Vec::new(),
                    tbl2_r: Vec::new(),
                    tbl3_l: Vec::new(),
                    tbl3_r: Vec::new(),
                })
            }
            (16, 64) => {
                let (tbl1_l, tbl1_r) = build_w16_tables(ALPHA);
                let (tbl2_l, tbl2_r) = build_w16_tables(BETA);
                let (tbl3_l, tbl3_r) = build_w16_tables(GAMMA);
                Ok(Self {
                    gf_w,
                    sig_len,
                    tbl1_l,
                    tbl1_r,
                    tbl2_l,
                    tbl2_r,
                    tbl3_l,
                    tbl3_r,
                })
            }
            _ => Err(Error::InvalidParams(format!(
                "unsupported algebraic signature pair (w = {}, sig_len = {})",
                gf_w, sig_len
            ))),
        }
    }

    /// Signature length in bytes
    pub fn sig_bytes(&self) -> usize {
        self.sig_len / 8
    }

    /// Compute the signature of `buf`.
    pub fn compute(&self, buf: &[u8]) -> Vec<u8> {
        match (self.gf_w, self.sig_len) {
            (8, 32) => self.compute_w8_32(buf),
            (16, 32) => self.compute_w16(buf, 2),
            (16, 64) => self.compute_w16(buf, 4),
            _ => unreachable!("constructor rejects unsupported pairs"),
        }
    }

    fn mult_tbl(s: u16, left: &[u16], right: &[u16]) -> u16 {
        left[(s >> 8) as usize] ^ right[(s & 0xff) as usize]
    }

    fn mult_tbl8(s: u8, left: &[u16], right: &[u16]) -> u8 {
        (left[(s >> 4) as usize] ^ right[(s & 0x0f) as usize]) as u8
    }

    fn compute_w8_32(&self, buf: &[u8]) -> Vec<u8> {
        if buf.is_empty() {
            return vec![0u8; 4];
        }
        let last = buf[buf.len() - 1];
        let mut sig = [last; 4];
        for &b in buf[..buf.len() - 1].iter().rev() {
            sig[0] ^= b;
            sig[1] = b ^ Self::mult_tbl8(sig[1], &self.tbl1_l, &self.tbl1_r);
            sig[2] = b ^ Self::mult_tbl8(sig[2], &self.tbl2_l, &self.tbl2_r);
            sig[3] = b ^ Self::mult_tbl8(sig[3], &self.tbl3_l, &self.tbl3_r);
        }
        sig.to_vec()
    }

    fn compute_w16(&self, buf: &[u8], components: usize) -> Vec<u8> {
        let out_len = components * 2;
        if buf.is_empty() {
            return vec![0u8; out_len];
        }

        // Little-endian u16 words; an odd trailing byte forms a final word on
        // its own.
        let mut words: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        if buf.len() % 2 == 1 {
            words.push(buf[buf.len() - 1] as u16);
        }

        let last = words[words.len() - 1];
        let mut sig = [last; 4];
        for &w in words[..words.len() - 1].iter().rev() {
            sig[0] ^= w;
            sig[1] = w ^ Self::mult_tbl(sig[1], &self.tbl1_l, &self.tbl1_r);
            if components >= 4 {
                sig[2] = w ^ Self::mult_tbl(sig[2], &self.tbl2_l, &self.tbl2_r);
                sig[3] = w ^ Self::mult_tbl(sig[3], &self.tbl3_l, &self.tbl3_r);
            }
        }

        let mut out = Vec::with_capacity(out_len);
        for component in sig.iter().take(components) {
            out.extend_from_slice(&component.to_le_bytes());
        }
        out
    }
}
