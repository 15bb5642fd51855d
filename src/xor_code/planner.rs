//! Minimal-fragment planning for flat-XOR repairs
//!
//! Given targets to rebuild and fragments the caller refuses to read, the
//! planner picks the smallest sufficient read set: for a lone missing data
//! shard that is one connected parity plus the data it covers; everything
//! else folds the exclusions into the missing set and walks the same
//! connected-parity reduction the decoder uses, collecting the touched
//! shards into data/parity need-bitmaps.

use super::{FailurePattern, XorCode};
use crate::error::{Error, Result};

fn insufficient(code: &XorCode, missing: usize) -> Error {
    Error::InsufficientFragments {
        available: code.k + code.m - missing,
        required: code.k,
    }
}

fn data_bitmap(missing_data: &[usize]) -> u32 {
    missing_data.iter().fold(0u32, |bm, &d| bm | 1 << d)
}

/// Plan for one missing data shard: a connected parity and the other data it
/// covers. Returns `None` when every covering parity is missing or covers
/// another missing shard.
fn needed_one_data(
    code: &XorCode,
    missing_data: &[usize],
    missing_parity: &[usize],
    data_bm: &mut u32,
    parity_bm: &mut u32,
) -> Option<()> {
    let target = missing_data[0];
    let p = code.connected_parity(target, missing_parity, missing_data)?;
    *data_bm |= code.parity_bm(p);
    *parity_bm |= 1 << p;
    *data_bm &= !(1u32 << target);
    Some(())
}

fn needed_two_data(
    code: &XorCode,
    missing_data: &[usize],
    missing_parity: &[usize],
    data_bm: &mut u32,
    parity_bm: &mut u32,
) -> Option<()> {
    let (target, remaining) = if code
        .connected_parity(missing_data[0], missing_parity, missing_data)
        .is_some()
    {
        (missing_data[0], missing_data[1])
    } else {
        (missing_data[1], missing_data[0])
    };
    let p = code.connected_parity(target, missing_parity, missing_data)?;

    *data_bm |= code.parity_bm(p);
    *parity_bm |= 1 << p;

    needed_one_data(code, &[remaining], missing_parity, data_bm, parity_bm)?;
    *data_bm &= !(1u32 << target);
    Some(())
}

fn needed_three_data(
    code: &XorCode,
    missing_data: &[usize],
    missing_parity: &[usize],
    data_bm: &mut u32,
    parity_bm: &mut u32,
) -> Option<()> {
    let direct = missing_data.iter().find_map(|&d| {
        code.connected_parity(d, missing_parity, missing_data)
            .map(|p| (d, p))
    });

    let (target, covered_bm) = match direct {
        Some((d, p)) => {
            *parity_bm |= 1 << p;
            (d, code.parity_bm(p))
        }
        None => {
            let mut contains_2d = None;
            let mut contains_3d = None;
            for p in 0..code.m {
                match code.num_missing_data_in_parity(p, missing_data) {
                    2 if contains_2d.is_none() => contains_2d = Some(p),
                    3 if contains_3d.is_none() => contains_3d = Some(p),
                    _ => {}
                }
            }
            let (c2, c3) = match (contains_2d, contains_3d) {
                (Some(c2), Some(c3)) => (c2, c3),
                _ => return None,
            };
            let bm = code.parity_bm(c2) ^ code.parity_bm(c3);
            let target = missing_data.iter().copied().find(|&d| bm >> d & 1 == 1)?;
            *parity_bm |= 1 << c2;
            *parity_bm |= 1 << c3;
            (target, bm)
        }
    };

    *data_bm |= covered_bm;

    let remaining: Vec<usize> = missing_data
        .iter()
        .copied()
        .filter(|&d| d != target)
        .collect();
    needed_two_data(code, &remaining, missing_parity, data_bm, parity_bm)?;
    *data_bm &= !(1u32 << target);
    Some(())
}

/// Fast path for a single missing data shard: plan around the exclusions
/// without forcing them into the failure pattern.
fn needed_one_data_local(
    code: &XorCode,
    target: usize,
    to_exclude: &[usize],
    data_bm: &mut u32,
    parity_bm: &mut u32,
) -> Option<()> {
    // The target joins the excluded data for the connected-parity check so a
    // parity covering both the target and an excluded shard is never chosen.
    let mut missing_data: Vec<usize> = to_exclude.iter().copied().filter(|&i| i < code.k).collect();
    missing_data.push(target);
    let missing_parity: Vec<usize> = to_exclude.iter().copied().filter(|&i| i >= code.k).collect();

    let p = code.connected_parity(target, &missing_parity, &missing_data)?;
    *data_bm |= code.parity_bm(p);
    *parity_bm |= 1 << p;
    *data_bm &= !(1u32 << target);
    Some(())
}

pub(super) fn fragments_needed(
    code: &XorCode,
    to_reconstruct: &[usize],
    to_exclude: &[usize],
) -> Result<Vec<usize>> {
    let mut data_bm = 0u32;
    let mut parity_bm = 0u32;

    let mut planned = if code.classify(to_reconstruct) == FailurePattern::OneData {
        needed_one_data_local(
            code,
            to_reconstruct[0],
            to_exclude,
            &mut data_bm,
            &mut parity_bm,
        )
        .is_some()
    } else {
        false
    };

    if !planned {
        // Give up on optimising around the exclusions: treat every excluded
        // fragment as missing and plan the full repair.
        let mut missing: Vec<usize> = to_reconstruct
            .iter()
            .chain(to_exclude.iter())
            .copied()
            .collect();
        missing.sort_unstable();
        missing.dedup();

        data_bm = 0;
        parity_bm = 0;

        let missing_data: Vec<usize> = missing.iter().copied().filter(|&i| i < code.k).collect();
        let missing_parity: Vec<usize> = missing.iter().copied().filter(|&i| i >= code.k).collect();
        let missing_data_bm = data_bitmap(&missing_data);

        planned = match code.classify(&missing) {
            FailurePattern::NoneMissing => true,
            FailurePattern::OneData => {
                needed_one_data(code, &missing_data, &[], &mut data_bm, &mut parity_bm).is_some()
            }
            FailurePattern::TwoData => {
                needed_two_data(code, &missing_data, &[], &mut data_bm, &mut parity_bm).is_some()
            }
            FailurePattern::ThreeData => {
                needed_three_data(code, &missing_data, &[], &mut data_bm, &mut parity_bm).is_some()
            }
            FailurePattern::OneDataOneParity | FailurePattern::OneDataTwoParity => {
                let ok = needed_one_data(
                    code,
                    &missing_data,
                    &missing_parity,
                    &mut data_bm,
                    &mut parity_bm,
                )
                .is_some();
                // Rebuilding the lost parities reads the data they cover
                for &mp in &missing_parity {
                    data_bm |= code.parity_bm(mp - code.k);
                }
                data_bm &= !missing_data_bm;
                ok
            }
            FailurePattern::TwoDataOneParity => {
                let ok = needed_two_data(
                    code,
                    &missing_data,
                    &missing_parity,
                    &mut data_bm,
                    &mut parity_bm,
                )
                .is_some();
                for &mp in &missing_parity {
                    data_bm |= code.parity_bm(mp - code.k);
                }
                data_bm &= !missing_data_bm;
                ok
            }
            FailurePattern::OneParity | FailurePattern::TwoParity | FailurePattern::ThreeParity => {
                for &mp in &missing_parity {
                    data_bm |= code.parity_bm(mp - code.k);
                }
                true
            }
            FailurePattern::GeHd => return Err(insufficient(code, missing.len())),
        };

        if !planned {
            return Err(insufficient(code, missing.len()));
        }
    }

    let mut needed = Vec::new();
    for d in 0..code.k {
        if data_bm >> d & 1 == 1 {
            needed.push(d);
        }
    }
    for p in 0..code.m {
        if parity_bm >> p & 1 == 1 {
            needed.push(code.k + p);
        }
    }
    Ok(needed)
}
