use crate::consts::HASH_SEED;
use xxhash_rust::xxh3::xxh3_128_with_seed;

/// Two base hashes for double hashing: low and high halves of xxh3-128.
///
/// `h2` is forced odd. Filter sizes are whole bytes, so `m` is even and an
/// odd `h2` is never `0 mod m`; otherwise all `k` positions would collapse
/// onto `h1`.
#[inline]
pub fn base_hashes(key: &[u8]) -> (u64, u64) {
    let h = xxh3_128_with_seed(key, HASH_SEED);
    (h as u64, (h >> 64) as u64 | 1)
}

/// Kirsch–Mitzenmacher bit positions `(h1 + i*h2) mod m` for `i in 0..k`.
#[inline]
pub fn bit_positions(key: &[u8], k: u32, m: u64) -> impl Iterator<Item = u64> {
    let (h1, h2) = base_hashes(key);
    (0..k as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_stable_and_in_range() {
        let a: Vec<u64> = bit_positions(b"alpha", 7, 1000).collect();
        let b: Vec<u64> = bit_positions(b"alpha", 7, 1000).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 7);
        assert!(a.iter().all(|&x| x < 1000));
    }

    #[test]
    fn first_position_is_h1() {
        let (h1, h2) = base_hashes(b"key");
        assert_ne!(h1, h2);
        let first = bit_positions(b"key", 3, u64::MAX).next().unwrap();
        assert_eq!(first, h1 % u64::MAX);
    }

    #[test]
    fn h2_is_odd() {
        for i in 0..1000u32 {
            assert_eq!(base_hashes(&i.to_le_bytes()).1 & 1, 1);
        }
    }

    #[test]
    fn positions_never_collapse_in_power_of_two_filter() {
        // 8 bytes: an odd stride visits k distinct bits for any k <= 64
        for i in 0..5000u32 {
            let mut bits: Vec<u64> = bit_positions(&i.to_le_bytes(), 8, 64).collect();
            bits.sort_unstable();
            bits.dedup();
            assert_eq!(bits.len(), 8, "key {i}");
        }
    }

    #[test]
    fn different_keys_differ() {
        assert_ne!(base_hashes(b"a"), base_hashes(b"b"));
    }
}
