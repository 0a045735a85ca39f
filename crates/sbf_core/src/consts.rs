// crates/sbf_core/src/consts.rs

/// Defaults for a fresh chain (same values bloomd ships with).
pub const DEFAULT_INITIAL_CAPACITY: u64 = 100_000;
pub const DEFAULT_FP_PROBABILITY: f64 = 1e-4;
pub const DEFAULT_SCALE_SIZE: u32 = 4;
pub const DEFAULT_PROBABILITY_REDUCTION: f64 = 0.9;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

pub const FILTER_FILE_PREFIX: &str = "filter-";
pub const FILTER_FILE_EXT: &str = "bmp";

/// Fixed seed for the xxh3-128 key hash. Changing it invalidates every
/// bitmap already on disk.
pub const HASH_SEED: u64 = 0;

const _: () = { assert!(DEFAULT_SCALE_SIZE >= 1); };
