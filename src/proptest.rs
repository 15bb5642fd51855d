//! Property-Based Tests for the erasure-coding pipeline
//!
//! Uses proptest to verify the frontend end-to-end across configurations:
//! roundtrips under random erasure, single-fragment reconstruction, the
//! systematic layout of data fragments, and the alignment arithmetic.

#![cfg(test)]

use proptest::prelude::*;

use crate as ec;
use crate::frontend::preprocessing::aligned_data_size;
use crate::{BackendId, ChecksumType, EcArgs};

fn rs_args(k: usize, m: usize) -> EcArgs {
    let mut args = EcArgs::new(k, m);
    args.ct = ChecksumType::Crc32;
    args
}

/// Strategy for small RS configurations
fn rs_config_strategy() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=10, 1usize..=4)
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..4000)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Encoding then decoding the full stripe returns the payload.
    #[test]
    fn prop_rs_roundtrip_no_loss(
        (k, m) in rs_config_strategy(),
        payload in payload_strategy(),
    ) {
        let desc = ec::instance_create(BackendId::LiberasurecodeRsVand, &rs_args(k, m)).unwrap();
        let stripe = ec::encode(desc, &payload).unwrap();
        let refs: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();
        let decoded = ec::decode(desc, &refs, true).unwrap();
        prop_assert_eq!(&*decoded, payload.as_slice());
        ec::instance_destroy(desc).unwrap();
    }

    /// Any subset of >= k surviving fragments recovers the payload.
    #[test]
    fn prop_rs_roundtrip_with_erasures(
        (k, m) in rs_config_strategy(),
        payload in payload_strategy(),
        seed in any::<u64>(),
    ) {
        let desc = ec::instance_create(BackendId::LiberasurecodeRsVand, &rs_args(k, m)).unwrap();
        let stripe = ec::encode(desc, &payload).unwrap();

        // Drop up to m fragments, chosen by the seed
        let mut dropped = Vec::new();
        let mut state = seed | 1;
        for _ in 0..m {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let idx = (state >> 33) as usize % (k + m);
            if !dropped.contains(&idx) {
                dropped.push(idx);
            }
        }

        let refs: Vec<&[u8]> = stripe
            .fragments()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, f)| f.as_bytes())
            .collect();
        let decoded = ec::decode(desc, &refs, false).unwrap();
        prop_assert_eq!(&*decoded, payload.as_slice());
        ec::instance_destroy(desc).unwrap();
    }

    /// Reconstructing any single fragment reproduces it byte for byte.
    #[test]
    fn prop_rs_reconstruct_identity(
        (k, m) in (2usize..=6, 1usize..=3),
        payload in prop::collection::vec(any::<u8>(), 1..1500),
        target_seed in any::<usize>(),
    ) {
        let desc = ec::instance_create(BackendId::LiberasurecodeRsVand, &rs_args(k, m)).unwrap();
        let stripe = ec::encode(desc, &payload).unwrap();
        let all: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();
        let target = target_seed % (k + m);

        let refs: Vec<&[u8]> = all
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target)
            .map(|(_, f)| *f)
            .collect();
        let rebuilt = ec::reconstruct_fragment(desc, &refs, target).unwrap();
        prop_assert_eq!(rebuilt.as_bytes(), all[target]);
        ec::instance_destroy(desc).unwrap();
    }

    /// The first k fragments' payload regions are a partition of the
    /// zero-padded payload.
    #[test]
    fn prop_rs_systematic_layout(
        (k, m) in rs_config_strategy(),
        payload in payload_strategy(),
    ) {
        let desc = ec::instance_create(BackendId::LiberasurecodeRsVand, &rs_args(k, m)).unwrap();
        let stripe = ec::encode(desc, &payload).unwrap();

        let mut concatenated = Vec::new();
        for frag in &stripe.data {
            concatenated.extend_from_slice(frag.payload());
        }
        prop_assert!(concatenated.len() >= payload.len());
        prop_assert_eq!(&concatenated[..payload.len()], payload.as_slice());
        prop_assert!(concatenated[payload.len()..].iter().all(|&b| b == 0));
        ec::instance_destroy(desc).unwrap();
    }

    /// Every stamped fragment validates, and its metadata round-trips.
    #[test]
    fn prop_fragment_headers_self_describe(
        (k, m) in rs_config_strategy(),
        payload in prop::collection::vec(any::<u8>(), 1..2000),
    ) {
        let desc = ec::instance_create(BackendId::LiberasurecodeRsVand, &rs_args(k, m)).unwrap();
        let stripe = ec::encode(desc, &payload).unwrap();
        for (i, frag) in stripe.fragments().enumerate() {
            let meta = ec::get_fragment_metadata(desc, frag.as_bytes()).unwrap();
            prop_assert_eq!(meta.idx as usize, i);
            prop_assert_eq!(meta.orig_data_size, payload.len() as u64);
            prop_assert!(!meta.chksum_mismatch);
        }
        let report = ec::verify_stripe_metadata(
            desc,
            &stripe.fragments().map(|f| f.as_bytes()).collect::<Vec<_>>(),
        )
        .unwrap();
        prop_assert!(report.all_ok());
        ec::instance_destroy(desc).unwrap();
    }

    /// Alignment sizes are multiples of the quantum, monotonic, and minimal.
    #[test]
    fn prop_alignment_math(
        k in 1usize..=24,
        w in prop::sample::select(vec![8usize, 16, 32]),
        len in 1u64..1_000_000,
    ) {
        let quantum = (k * w / 8) as u64;
        let aligned = aligned_data_size(k, w, len);
        prop_assert!(aligned >= len);
        prop_assert_eq!(aligned % quantum, 0);
        prop_assert!(aligned - len < quantum);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Flat-XOR decode recovers from any loss within the hamming distance.
    #[test]
    fn prop_xor_roundtrip_with_erasures(
        shape_seed in any::<usize>(),
        payload in prop::collection::vec(any::<u8>(), 1..2000),
        drop_seed in any::<u64>(),
    ) {
        let shapes = [(10usize, 5usize, 3usize), (12, 6, 4), (6, 6, 3), (20, 6, 4)];
        let (k, m, hd) = shapes[shape_seed % shapes.len()];
        let mut args = EcArgs::new(k, m);
        args.hd = hd;
        args.ct = ChecksumType::Crc32;
        let desc = ec::instance_create(BackendId::FlatXorHd, &args).unwrap();

        let stripe = ec::encode(desc, &payload).unwrap();

        let mut dropped = Vec::new();
        let mut state = drop_seed | 1;
        while dropped.len() < hd - 1 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let idx = (state >> 33) as usize % (k + m);
            if !dropped.contains(&idx) {
                dropped.push(idx);
            }
        }

        let refs: Vec<&[u8]> = stripe
            .fragments()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, f)| f.as_bytes())
            .collect();
        let decoded = ec::decode(desc, &refs, false).unwrap();
        prop_assert_eq!(&*decoded, payload.as_slice());
        ec::instance_destroy(desc).unwrap();
    }
}
