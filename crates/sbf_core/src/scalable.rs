//! Scalable Bloom filter: a chain of Bloom filters whose capacity grows and
//! whose false-positive budget shrinks geometrically.
//!
//! Filter `i` is designed for `initial_capacity * scale_size^i` items at
//! probability `fp_probability * probability_reduction^i`. Only the newest
//! filter takes inserts; every filter answers queries. There is no internal
//! locking; wrap the chain in a [`SbfHandle`] to share it between threads.

use crate::allocator::{AnonymousAllocator, BitmapAllocator};
use crate::bitmap::Bitmap;
use crate::consts::{
    DEFAULT_FP_PROBABILITY, DEFAULT_INITIAL_CAPACITY, DEFAULT_PROBABILITY_REDUCTION,
    DEFAULT_SCALE_SIZE,
};
use crate::errors::{Result, SbfError};
use crate::filter::{AddOutcome, BloomFilter};
use crate::params::FilterParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub type SbfHandle = Arc<Mutex<ScalableBloomFilter>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SbfParams {
    pub initial_capacity: u64,
    pub fp_probability: f64,
    pub scale_size: u32,
    pub probability_reduction: f64,
}

impl Default for SbfParams {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            fp_probability: DEFAULT_FP_PROBABILITY,
            scale_size: DEFAULT_SCALE_SIZE,
            probability_reduction: DEFAULT_PROBABILITY_REDUCTION,
        }
    }
}

impl SbfParams {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(SbfError::invalid("initial capacity must be positive"));
        }
        if !(self.fp_probability > 0.0 && self.fp_probability < 1.0) {
            return Err(SbfError::invalid(format!(
                "false-positive probability {} not in (0,1)",
                self.fp_probability
            )));
        }
        if self.scale_size < 1 {
            return Err(SbfError::invalid("scale size must be at least 1"));
        }
        if !(self.probability_reduction > 0.0 && self.probability_reduction <= 1.0) {
            return Err(SbfError::invalid(format!(
                "probability reduction {} not in (0,1]",
                self.probability_reduction
            )));
        }
        Ok(())
    }

    /// Designed capacity of filter `index` (truncated toward zero).
    pub fn designed_capacity(&self, index: usize) -> u64 {
        (self.initial_capacity as f64 * (self.scale_size as f64).powi(index as i32)) as u64
    }

    pub fn designed_fp_probability(&self, index: usize) -> f64 {
        self.fp_probability * self.probability_reduction.powi(index as i32)
    }

    pub fn filter_params(&self, index: usize) -> Result<FilterParams> {
        FilterParams::for_capacity(
            self.designed_capacity(index),
            self.designed_fp_probability(index),
        )
    }
}

/// Error from [`ScalableBloomFilter::close`].
///
/// When the flush fails nothing has been closed yet and `chain` holds the
/// whole chain, dirty flags intact, so the caller can retry. When closing an
/// owned filter fails the remaining filters are still closed; `chain` is
/// `None` and `unowned` holds every bitmap the chain did not own.
#[derive(Debug, thiserror::Error)]
#[error("closing scalable filter: {error}")]
pub struct ChainCloseError {
    #[source]
    pub error: SbfError,
    pub chain: Option<Box<ScalableBloomFilter>>,
    pub unowned: Vec<Bitmap>,
}

pub struct ScalableBloomFilter {
    params: SbfParams,
    allocator: Option<Box<dyn BitmapAllocator + Send>>,
    filters: Vec<BloomFilter>,
    /// parallel to `filters`
    dirty: Vec<bool>,
}

impl fmt::Debug for ScalableBloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalableBloomFilter")
            .field("params", &self.params)
            .field("custom_allocator", &self.allocator.is_some())
            .field("filters", &self.filters.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl ScalableBloomFilter {
    /// Builds a chain.
    ///
    /// A non-empty `existing` list is adopted as-is (oldest first) and marked
    /// clean. Otherwise filter 0 is created straight away, from `allocator`
    /// or anonymous memory; its allocation error is returned unchanged.
    pub fn new(
        params: SbfParams,
        allocator: Option<Box<dyn BitmapAllocator + Send>>,
        existing: Vec<BloomFilter>,
    ) -> Result<Self> {
        params.validate()?;
        let dirty = vec![false; existing.len()];
        let mut sbf = Self { params, allocator, filters: existing, dirty };
        if sbf.filters.is_empty() {
            let filter = sbf.build_filter(0)?;
            sbf.link(filter);
        }
        Ok(sbf)
    }

    /// Fresh chain on anonymous memory.
    pub fn anonymous(params: SbfParams) -> Result<Self> {
        Self::new(params, None, Vec::new())
    }

    /// Fresh chain whose bitmaps come from `allocator`.
    pub fn with_allocator<A>(params: SbfParams, allocator: A) -> Result<Self>
    where
        A: BitmapAllocator + Send + 'static,
    {
        Self::new(params, Some(Box::new(allocator)), Vec::new())
    }

    /// Adds `key` unless some filter in the chain already reports it.
    ///
    /// New keys go to the newest filter, which is marked dirty; the chain
    /// grows once that filter's estimated count reaches its designed
    /// capacity. If that growth fails the key stays inserted, the error is
    /// returned, and growth is attempted again on the next add.
    pub fn add(&mut self, key: &[u8]) -> Result<AddOutcome> {
        if self.contains(key) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        let last = self.filters.len() - 1;
        let outcome = self.filters[last].add(key);
        self.dirty[last] = true;

        if self.filters[last].estimated_count() >= self.params.designed_capacity(last) {
            self.grow()?;
        }
        Ok(outcome)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.filters.iter().any(|f| f.contains(key))
    }

    /// Appends the next filter in the geometric series. On failure the chain
    /// is left exactly as it was.
    pub fn grow(&mut self) -> Result<()> {
        let index = self.filters.len();
        let fp = self.params.filter_params(index)?;
        let filter = self
            .build_filter(index)
            .map_err(|e| SbfError::AllocationFailed { requested: fp.bytes, source: Box::new(e) })?;
        info!(
            index,
            capacity = fp.capacity,
            fp_probability = fp.fp_probability,
            k = fp.k,
            bytes = fp.bytes,
            "scalable filter grew"
        );
        self.link(filter);
        Ok(())
    }

    fn build_filter(&mut self, index: usize) -> Result<BloomFilter> {
        let fp = self.params.filter_params(index)?;
        let map = match self.allocator.as_mut() {
            Some(alloc) => alloc.allocate(fp.bytes)?,
            None => AnonymousAllocator.allocate(fp.bytes)?,
        };
        if map.len() < fp.bytes {
            // `map` is dropped (unmapped) here, never linked
            return Err(SbfError::invalid(format!(
                "allocator returned {} bytes, filter {index} needs {}",
                map.len(),
                fp.bytes
            )));
        }
        Ok(BloomFilter::new(map, fp.k, true))
    }

    fn link(&mut self, filter: BloomFilter) {
        self.filters.push(filter);
        self.dirty.push(false);
    }

    /// Sum of the per-filter estimated counts.
    pub fn size(&self) -> u64 {
        self.filters.iter().fold(0u64, |acc, f| acc.saturating_add(f.estimated_count()))
    }

    pub fn total_capacity(&self) -> u64 {
        (0..self.filters.len())
            .fold(0u64, |acc, i| acc.saturating_add(self.params.designed_capacity(i)))
    }

    pub fn total_byte_size(&self) -> u64 {
        self.filters.iter().map(|f| f.byte_size()).sum()
    }

    pub fn params(&self) -> &SbfParams {
        &self.params
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn filters(&self) -> &[BloomFilter] {
        &self.filters
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty.get(index).copied().unwrap_or(false)
    }

    /// Syncs every dirty filter and clears its flag. Returns how many filters
    /// were synced. On error, filters already synced stay clean and the
    /// failing one stays dirty.
    pub fn flush(&mut self) -> Result<usize> {
        let mut synced = 0;
        for (i, filter) in self.filters.iter().enumerate() {
            if !self.dirty[i] {
                continue;
            }
            if let Err(e) = filter.flush() {
                warn!(index = i, error = %e, "filter flush failed");
                return Err(e);
            }
            self.dirty[i] = false;
            synced += 1;
        }
        Ok(synced)
    }

    /// Flushes, then closes every filter. Bitmaps the chain does not own are
    /// returned in chain order, still open, on success and on failure.
    pub fn close(mut self) -> std::result::Result<Vec<Bitmap>, ChainCloseError> {
        if let Err(error) = self.flush() {
            return Err(ChainCloseError { error, chain: Some(Box::new(self)), unowned: Vec::new() });
        }
        let mut unowned = Vec::new();
        let mut first_err = None;
        for (i, filter) in self.filters.drain(..).enumerate() {
            match filter.close() {
                Ok(Some(map)) => unowned.push(map),
                Ok(None) => {}
                Err(e) => {
                    warn!(index = i, error = %e, "filter close failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        self.dirty.clear();
        match first_err {
            None => Ok(unowned),
            Some(error) => Err(ChainCloseError { error, chain: None, unowned }),
        }
    }
}
