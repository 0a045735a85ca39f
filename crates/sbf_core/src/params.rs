//! Bloom filter sizing.
//!
//! `k = round(-log2 p)` (at least 1), `m = ceil(n * k / ln 2)` bits rounded up
//! to whole bytes. These must stay bit-for-bit stable: a reloaded filter's
//! file length is checked against them.

use crate::errors::{Result, SbfError};
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Designed item count.
    pub capacity: u64,
    /// Designed false-positive probability.
    pub fp_probability: f64,
    /// Probes per key.
    pub k: u32,
    /// Bits in the array (always `bytes * 8`).
    pub bits: u64,
    pub bytes: u64,
}

impl FilterParams {
    pub fn for_capacity(capacity: u64, fp_probability: f64) -> Result<Self> {
        check_probability(fp_probability)?;
        if capacity == 0 {
            return Err(SbfError::invalid("capacity must be positive"));
        }
        let k = k_for_probability(fp_probability);
        let raw_bits = (capacity as f64 * k as f64 / LN_2).ceil();
        if raw_bits >= u64::MAX as f64 {
            return Err(SbfError::invalid(format!("capacity {capacity} needs more than 2^64 bits")));
        }
        let bytes = (raw_bits as u64).div_ceil(8);
        Ok(Self { capacity, fp_probability, k, bits: bytes * 8, bytes })
    }
}

fn check_probability(p: f64) -> Result<()> {
    if !(p > 0.0 && p < 1.0) {
        return Err(SbfError::invalid(format!("false-positive probability {p} not in (0,1)")));
    }
    Ok(())
}

/// Probes needed to reach probability `p` on an optimally sized array.
pub fn k_for_probability(p: f64) -> u32 {
    ((-p.log2()).round() as u32).max(1)
}

/// Optimal hash count for `bits` bits holding `capacity` items.
pub fn ideal_k(bits: u64, capacity: u64) -> Result<u32> {
    if bits == 0 || capacity == 0 {
        return Err(SbfError::invalid("bits and capacity must be positive"));
    }
    Ok(((LN_2 * bits as f64 / capacity as f64).round() as u32).max(1))
}

/// Largest capacity whose derived byte size fits in `bytes` at probability `p`.
pub fn capacity_for_size(bytes: u64, fp_probability: f64) -> Result<u64> {
    check_probability(fp_probability)?;
    let k = k_for_probability(fp_probability) as f64;
    let mut n = ((bytes * 8) as f64 * LN_2 / k).floor() as u64;
    // float rounding can overshoot by one
    while n > 0 && FilterParams::for_capacity(n, fp_probability)?.bytes > bytes {
        n -= 1;
    }
    Ok(n)
}

/// Expected false-positive rate of `bytes` bytes with `k` hashes after
/// `count` insertions: `(1 - e^(-k n / m))^k`.
pub fn fp_probability_for(bytes: u64, count: u64, k: u32) -> f64 {
    if bytes == 0 {
        return 1.0;
    }
    let m = (bytes * 8) as f64;
    let k = k as f64;
    (1.0 - (-k * count as f64 / m).exp()).powf(k)
}
