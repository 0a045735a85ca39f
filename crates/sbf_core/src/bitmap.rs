//! Raw bit array over a memory map.
//!
//! The mapped bytes are the on-disk format: bit `i` lives in byte `i >> 3`
//! at position `7 - (i % 8)` (MSB first). A shared map writes through to its
//! file; an anonymous map lives and dies with the process.

use crate::errors::{Result, SbfError};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// `MAP_SHARED` over a file; flush syncs to disk.
    Shared,
    /// `MAP_ANONYMOUS`; flush is a no-op.
    Anonymous,
}

/// A fixed-size, exclusively owned bit region.
///
/// The map and descriptor are released when the value is dropped, on every
/// path. `close` additionally syncs a shared map first.
#[derive(Debug)]
pub struct Bitmap {
    mmap: MmapMut,
    backing: Backing,
    file: Option<File>,
    path: Option<PathBuf>,
    /// Fails the next `flush` once.
    #[cfg(test)]
    fail_flush: std::sync::atomic::AtomicBool,
}

impl Bitmap {
    /// Maps `len` bytes of an already opened read/write file.
    ///
    /// The file must already be at least `len` bytes long.
    pub fn from_file(file: File, len: u64) -> Result<Self> {
        Self::map_shared(file, len, None)
    }

    /// Opens `path` read/write and maps its first `len` bytes.
    ///
    /// With `create` the file is created when absent; with `resize` a file
    /// shorter than `len` is extended (sparse) before mapping.
    pub fn from_path(path: impl AsRef<Path>, len: u64, create: bool, resize: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => SbfError::NotFound(path.to_path_buf()),
                _ => SbfError::Io(e),
            })?;
        if resize && file.metadata()?.len() < len {
            file.set_len(len)?;
        }
        Self::map_shared(file, len, Some(path.to_path_buf()))
    }

    /// Maps `len` zeroed bytes with no file behind them.
    pub fn anonymous(len: u64) -> Result<Self> {
        let bytes = map_len(len)?;
        let mmap = MmapOptions::new().len(bytes).map_anon()?;
        debug!(len, "mapped anonymous bitmap");
        Ok(Self {
            mmap,
            backing: Backing::Anonymous,
            file: None,
            path: None,
            #[cfg(test)]
            fail_flush: Default::default(),
        })
    }

    fn map_shared(file: File, len: u64, path: Option<PathBuf>) -> Result<Self> {
        let bytes = map_len(len)?;
        let on_disk = file.metadata()?.len();
        if on_disk < len {
            // Touching pages past EOF would SIGBUS instead of failing here.
            return Err(SbfError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file holds {on_disk} bytes, cannot map {len}"),
            )));
        }
        let mmap = unsafe { MmapOptions::new().len(bytes).map_mut(&file)? };
        debug!(len, path = ?path, "mapped shared bitmap");
        Ok(Self {
            mmap,
            backing: Backing::Shared,
            file: Some(file),
            path,
            #[cfg(test)]
            fail_flush: Default::default(),
        })
    }

    /// Size of the region in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Number of addressable bits.
    #[inline]
    pub fn bit_len(&self) -> u64 {
        self.len() * 8
    }

    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Path of the backing file, when the bitmap was opened by name.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads bit `idx`. Panics if `idx >= bit_len()`.
    #[inline]
    pub fn get_bit(&self, idx: u64) -> bool {
        (self.mmap[(idx >> 3) as usize] >> (7 - (idx % 8))) & 1 == 1
    }

    /// Writes bit `idx`. Read-modify-write of the containing byte, so two
    /// writers touching the same byte race. Panics if `idx >= bit_len()`.
    #[inline]
    pub fn set_bit(&mut self, idx: u64, value: bool) {
        let byte = &mut self.mmap[(idx >> 3) as usize];
        let mask = 1u8 << (7 - (idx % 8));
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Number of set bits in the whole region.
    pub fn count_ones(&self) -> u64 {
        self.mmap.iter().map(|b| b.count_ones() as u64).sum()
    }

    /// Synchronously writes dirty pages back to the file. No-op when anonymous.
    pub fn flush(&self) -> Result<()> {
        #[cfg(test)]
        if self.fail_flush.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(SbfError::Io(io::Error::other("msync failed")));
        }
        match self.backing {
            Backing::Shared => {
                self.mmap.flush()?;
                debug!(len = self.len(), path = ?self.path, "flushed bitmap");
                Ok(())
            }
            Backing::Anonymous => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_next_flush(&self) {
        self.fail_flush.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Flushes, unmaps and closes the descriptor.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        // map and file are released by drop
        Ok(())
    }
}

fn map_len(len: u64) -> Result<usize> {
    if len == 0 {
        return Err(SbfError::invalid("bitmap length must be non-zero"));
    }
    usize::try_from(len)
        .map_err(|_| SbfError::invalid(format!("bitmap length {len} exceeds address space")))
}
