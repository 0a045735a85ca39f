//! Single Bloom filter over a [`Bitmap`].
use crate::bitmap::Bitmap;
use crate::errors::Result;
use crate::hash::bit_positions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Every bit for the key was already set.
    AlreadyPresent,
}

#[derive(Debug)]
pub struct BloomFilter {
    bitmap: Bitmap,
    k: u32,
    /// m, taken from the bitmap
    bits: u64,
    /// set bits, kept in step with the bitmap
    bits_set: u64,
    owns_bitmap: bool,
}

impl BloomFilter {
    /// Wraps a bitmap that already has the right size. `m` is the bitmap's
    /// bit length; `k` is clamped to at least 1.
    ///
    /// Existing bits are counted once so a reloaded filter reports its load.
    pub fn new(bitmap: Bitmap, k: u32, owns_bitmap: bool) -> Self {
        let bits = bitmap.bit_len();
        let bits_set = bitmap.count_ones();
        Self { bitmap, k: k.max(1), bits, bits_set, owns_bitmap }
    }

    pub fn add(&mut self, key: &[u8]) -> AddOutcome {
        let mut present = true;
        for bit in bit_positions(key, self.k, self.bits) {
            if !self.bitmap.get_bit(bit) {
                self.bitmap.set_bit(bit, true);
                self.bits_set += 1;
                present = false;
            }
        }
        if present { AddOutcome::AlreadyPresent } else { AddOutcome::Added }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        bit_positions(key, self.k, self.bits).all(|bit| self.bitmap.get_bit(bit))
    }

    /// `-(m/k) * ln(1 - X/m)` with X the set-bit count. Saturates at
    /// `u64::MAX` once every bit is set.
    pub fn estimated_count(&self) -> u64 {
        let m = self.bits as f64;
        let x = self.bits_set as f64;
        let n = -(m / self.k as f64) * (1.0 - x / m).ln();
        n.round() as u64
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn bit_len(&self) -> u64 {
        self.bits
    }

    pub fn byte_size(&self) -> u64 {
        self.bitmap.len()
    }

    pub fn bits_set(&self) -> u64 {
        self.bits_set
    }

    pub fn owns_bitmap(&self) -> bool {
        self.owns_bitmap
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Syncs the bitmap regardless of ownership.
    pub fn flush(&self) -> Result<()> {
        self.bitmap.flush()
    }

    /// Closes an owned bitmap. A bitmap owned by someone else is not touched
    /// and is handed back.
    pub fn close(self) -> Result<Option<Bitmap>> {
        if self.owns_bitmap {
            self.bitmap.close()?;
            Ok(None)
        } else {
            Ok(Some(self.bitmap))
        }
    }
}
