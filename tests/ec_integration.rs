//! End-to-end tests for the erasure-coding frontend
//!
//! Each section exercises a full pipeline: instance creation, encode,
//! fragment loss, decode/reconstruct, verification, teardown.

use stripecode::{self as ec, BackendId, ChecksumType, EcArgs, FragmentStatus, HEADER_SIZE};

// =============================================================================
// Helpers
// =============================================================================

/// Honour RUST_LOG when debugging a failing case; safe to call repeatedly.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn rs_instance(k: usize, m: usize) -> ec::InstanceDesc {
    init_tracing();
    let mut args = EcArgs::new(k, m);
    args.w = 16;
    args.ct = ChecksumType::Crc32;
    ec::instance_create(BackendId::LiberasurecodeRsVand, &args).expect("create rs instance")
}

fn xor_instance(k: usize, m: usize, hd: usize) -> ec::InstanceDesc {
    init_tracing();
    let mut args = EcArgs::new(k, m);
    args.hd = hd;
    args.ct = ChecksumType::Crc32;
    ec::instance_create(BackendId::FlatXorHd, &args).expect("create flat-xor instance")
}

/// Deterministic pseudo-random payload
fn random_payload(len: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}

fn subsets_of_size(n: usize, size: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut stack = vec![(0usize, Vec::new())];
    while let Some((start, current)) = stack.pop() {
        if current.len() == size {
            out.push(current);
            continue;
        }
        for i in start..n {
            let mut next = current.clone();
            next.push(i);
            stack.push((i + 1, next));
        }
    }
    out
}

// =============================================================================
// Reed-Solomon end-to-end
// =============================================================================

#[test]
fn test_rs_decode_with_three_losses_one_mib() {
    let desc = rs_instance(10, 4);
    let payload = vec![0x78u8; 1 << 20];

    let stripe = ec::encode(desc, &payload).expect("encode");
    assert_eq!(stripe.data.len(), 10);
    assert_eq!(stripe.parity.len(), 4);

    // Drop fragments 3, 7 and 11
    let survivors: Vec<&[u8]> = stripe
        .fragments()
        .enumerate()
        .filter(|(i, _)| ![3, 7, 11].contains(i))
        .map(|(_, f)| f.as_bytes())
        .collect();

    let decoded = ec::decode(desc, &survivors, false).expect("decode");
    assert_eq!(&*decoded, payload.as_slice());

    ec::decode_cleanup(desc, decoded).unwrap();
    ec::encode_cleanup(desc, stripe).unwrap();
    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_rs_reconstruct_every_fragment_one_mib() {
    let desc = rs_instance(10, 4);
    let payload = random_payload(1 << 20, 0x1337);

    let stripe = ec::encode(desc, &payload).expect("encode");
    let all: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();

    for target in 0..14 {
        let survivors: Vec<&[u8]> = all
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target)
            .map(|(_, f)| *f)
            .collect();
        let rebuilt = ec::reconstruct_fragment(desc, &survivors, target)
            .unwrap_or_else(|e| panic!("reconstruct {} failed: {}", target, e));
        assert_eq!(
            rebuilt.as_bytes(),
            all[target],
            "fragment {} not byte-identical after reconstruction",
            target
        );
    }

    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_rs_decode_needs_k_fragments() {
    let desc = rs_instance(10, 4);
    let payload = random_payload(65536, 7);
    let stripe = ec::encode(desc, &payload).unwrap();

    let survivors: Vec<&[u8]> = stripe
        .fragments()
        .take(9)
        .map(|f| f.as_bytes())
        .collect();
    let err = ec::decode(desc, &survivors, false).unwrap_err();
    assert_eq!(err.code(), -208);

    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_rs_fragments_needed() {
    let desc = rs_instance(10, 4);
    // First k fragments outside the missing/excluded sets
    assert_eq!(
        ec::fragments_needed(desc, &[0], &[]).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
    );
    assert_eq!(
        ec::fragments_needed(desc, &[2], &[0, 1]).unwrap(),
        vec![3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
    );
    let err = ec::fragments_needed(desc, &[0, 1, 2], &[3, 4]).unwrap_err();
    assert_eq!(err.code(), -208);
    ec::instance_destroy(desc).unwrap();
}

// =============================================================================
// Flat-XOR end-to-end
// =============================================================================

#[test]
fn test_xor_hd4_decode_every_triple_loss() {
    let desc = xor_instance(12, 6, 4);
    let payload = random_payload(32 << 10, 42);
    let stripe = ec::encode(desc, &payload).expect("encode");
    let all: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();

    for missing in subsets_of_size(18, 3) {
        let survivors: Vec<&[u8]> = all
            .iter()
            .enumerate()
            .filter(|(i, _)| !missing.contains(i))
            .map(|(_, f)| *f)
            .collect();
        let decoded = ec::decode(desc, &survivors, false)
            .unwrap_or_else(|e| panic!("decode failed with missing {:?}: {}", missing, e));
        assert_eq!(
            &*decoded,
            payload.as_slice(),
            "payload mismatch with missing {:?}",
            missing
        );
    }

    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_xor_hd4_four_losses_fail_when_data_is_hit() {
    let desc = xor_instance(12, 6, 4);
    let payload = random_payload(32 << 10, 43);
    let stripe = ec::encode(desc, &payload).expect("encode");
    let all: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();

    for missing in subsets_of_size(18, 4) {
        let survivors: Vec<&[u8]> = all
            .iter()
            .enumerate()
            .filter(|(i, _)| !missing.contains(i))
            .map(|(_, f)| *f)
            .collect();
        let result = ec::decode(desc, &survivors, false);
        if missing.iter().any(|&i| i < 12) {
            // A lost data fragment at the hamming distance is unrecoverable
            let err = result
                .unwrap_err();
            assert_eq!(
                err.code(),
                -208,
                "expected insufficient-fragments for missing {:?}",
                missing
            );
        } else {
            // Parity-only losses leave the payload readable from the data
            let decoded = result
                .unwrap_or_else(|e| panic!("data-complete decode failed for {:?}: {}", missing, e));
            assert_eq!(&*decoded, payload.as_slice());
        }
    }

    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_xor_planner_plans_are_minimal_and_clean() {
    let desc = xor_instance(12, 6, 4);
    for target in 0..18 {
        let needed = ec::fragments_needed(desc, &[target], &[]).unwrap();
        assert!(!needed.contains(&target));
        assert!(needed.len() <= 17);
        for exclude in 0..18 {
            if exclude == target {
                continue;
            }
            let needed = ec::fragments_needed(desc, &[target], &[exclude]).unwrap();
            assert!(!needed.contains(&target));
            assert!(!needed.contains(&exclude));
        }
    }
    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_xor_reconstruct_single_fragment() {
    let desc = xor_instance(10, 5, 3);
    let payload = random_payload(10000, 99);
    let stripe = ec::encode(desc, &payload).unwrap();
    let all: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();

    for target in 0..15 {
        let survivors: Vec<&[u8]> = all
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target)
            .map(|(_, f)| *f)
            .collect();
        let rebuilt = ec::reconstruct_fragment(desc, &survivors, target).unwrap();
        assert_eq!(rebuilt.as_bytes(), all[target], "fragment {}", target);
    }

    ec::instance_destroy(desc).unwrap();
}

// =============================================================================
// Null backend & stripe verification
// =============================================================================

#[test]
fn test_null_backend_verify_and_tamper() {
    let mut args = EcArgs::new(8, 4);
    args.ct = ChecksumType::Crc32;
    let desc = ec::instance_create(BackendId::Null, &args).unwrap();

    let payload = random_payload(4096, 5);
    let stripe = ec::encode(desc, &payload).unwrap();
    let refs: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();

    let report = ec::verify_stripe_metadata(desc, &refs).unwrap();
    assert!(report.all_ok());

    // Flip one byte inside fragment 0's orig_data_size field (offset 16)
    let mut tampered: Vec<Vec<u8>> = refs.iter().map(|f| f.to_vec()).collect();
    tampered[0][16] ^= 0x01;
    let tampered_refs: Vec<&[u8]> = tampered.iter().map(|f| f.as_slice()).collect();

    let report = ec::verify_stripe_metadata(desc, &tampered_refs).unwrap();
    assert_eq!(report.fragments[0], FragmentStatus::BadHeader);
    assert!(report.fragments[1..]
        .iter()
        .all(|s| *s == FragmentStatus::Ok));

    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_payload_tamper_is_flagged_per_fragment() {
    let mut args = EcArgs::new(4, 2);
    args.ct = ChecksumType::Crc32;
    let desc = ec::instance_create(BackendId::Null, &args).unwrap();

    let stripe = ec::encode(desc, &random_payload(2048, 11)).unwrap();
    let mut bytes: Vec<Vec<u8>> = stripe.fragments().map(|f| f.as_bytes().to_vec()).collect();
    bytes[2][HEADER_SIZE + 5] ^= 0x80;
    let refs: Vec<&[u8]> = bytes.iter().map(|f| f.as_slice()).collect();

    let report = ec::verify_stripe_metadata(desc, &refs).unwrap();
    assert_eq!(report.fragments[2], FragmentStatus::BadChecksum);
    assert!(!report.all_ok());

    // A force-checked decode refuses the tampered fragment outright
    let err = ec::decode(desc, &refs, true).unwrap_err();
    assert_eq!(err.code(), -205);

    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_fragments_from_wrong_backend_are_reported() {
    let rs = rs_instance(4, 2);
    let mut args = EcArgs::new(4, 2);
    args.ct = ChecksumType::Crc32;
    let null = ec::instance_create(BackendId::Null, &args).unwrap();

    let stripe = ec::encode(rs, &random_payload(1024, 3)).unwrap();
    let refs: Vec<&[u8]> = stripe.fragments().map(|f| f.as_bytes()).collect();

    let report = ec::verify_stripe_metadata(null, &refs).unwrap();
    assert!(report
        .fragments
        .iter()
        .all(|s| *s == FragmentStatus::WrongBackend));

    ec::instance_destroy(null).unwrap();
    ec::instance_destroy(rs).unwrap();
}

// =============================================================================
// Algebraic signatures over a stripe
// =============================================================================

#[test]
fn test_xor_parity_signature_cancels_data_signatures() {
    let desc = rs_instance(10, 4);
    let payload = random_payload(1 << 18, 77);
    let stripe = ec::encode(desc, &payload).unwrap();

    let sig = ec::AlgSig::new(32, 16).unwrap();

    // The first parity of the systematic Vandermonde code is the plain XOR
    // of the data shards, so its signature cancels theirs.
    let mut total = vec![0u8; sig.sig_bytes()];
    for frag in &stripe.data {
        for (t, s) in total.iter_mut().zip(sig.compute(frag.payload()).iter()) {
            *t ^= s;
        }
    }
    for (t, s) in total
        .iter_mut()
        .zip(sig.compute(stripe.parity[0].payload()).iter())
    {
        *t ^= s;
    }
    assert!(
        total.iter().all(|&b| b == 0),
        "data and xor-parity signatures do not cancel"
    );

    ec::instance_destroy(desc).unwrap();
}

// =============================================================================
// Header round-trips through foreign storage
// =============================================================================

#[test]
fn test_fragments_survive_copy_through_unaligned_storage() {
    let desc = rs_instance(6, 3);
    let payload = random_payload(50000, 21);
    let stripe = ec::encode(desc, &payload).unwrap();

    // Simulate fragments coming back from storage at arbitrary alignment
    let mut blob = vec![0xeeu8; 1];
    for frag in stripe.fragments() {
        blob.extend_from_slice(frag.as_bytes());
    }
    let refs: Vec<&[u8]> = (0..9)
        .map(|i| &blob[1 + i * stripe.fragment_len..1 + (i + 1) * stripe.fragment_len])
        .skip(2)
        .collect();

    let decoded = ec::decode(desc, &refs, true).unwrap();
    assert_eq!(&*decoded, payload.as_slice());
    ec::instance_destroy(desc).unwrap();
}

#[test]
fn test_garbage_input_is_rejected() {
    let desc = rs_instance(4, 2);
    let garbage = vec![0xa5u8; 400];
    let refs: Vec<&[u8]> = (0..6).map(|_| garbage.as_slice()).collect();
    let err = ec::decode(desc, &refs, false).unwrap_err();
    assert_eq!(err.code(), -207);

    let empty: Vec<&[u8]> = Vec::new();
    let err = ec::decode(desc, &empty, false).unwrap_err();
    assert_eq!(err.code(), -206);

    ec::instance_destroy(desc).unwrap();
}
