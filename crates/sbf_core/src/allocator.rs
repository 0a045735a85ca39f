//! Where new filters get their bitmaps from.
use crate::bitmap::Bitmap;
use crate::consts::{FILTER_FILE_EXT, FILTER_FILE_PREFIX};
use crate::errors::Result;
use std::path::{Path, PathBuf};

/// Produces a fresh, zeroed bitmap of at least `bytes` bytes. Called once for
/// every filter the chain creates.
pub trait BitmapAllocator {
    fn allocate(&mut self, bytes: u64) -> Result<Bitmap>;
}

impl<F> BitmapAllocator for F
where
    F: FnMut(u64) -> Result<Bitmap>,
{
    fn allocate(&mut self, bytes: u64) -> Result<Bitmap> {
        self(bytes)
    }
}

/// Anonymous memory; nothing survives the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAllocator;

impl BitmapAllocator for AnonymousAllocator {
    fn allocate(&mut self, bytes: u64) -> Result<Bitmap> {
        Bitmap::anonymous(bytes)
    }
}

/// One file per filter, named `filter-NNNN.bmp` in sequence.
#[derive(Debug, Clone)]
pub struct DirAllocator {
    dir: PathBuf,
    next_index: usize,
}

impl DirAllocator {
    /// `next_index` is the chain index the next allocation will serve.
    pub fn new(dir: impl AsRef<Path>, next_index: usize) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), next_index }
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }
}

/// File name used for the filter at chain index `index`.
pub fn filter_file_name(index: usize) -> String {
    format!("{FILTER_FILE_PREFIX}{index:04}.{FILTER_FILE_EXT}")
}

impl BitmapAllocator for DirAllocator {
    fn allocate(&mut self, bytes: u64) -> Result<Bitmap> {
        let path = self.dir.join(filter_file_name(self.next_index));
        if path.exists() {
            // leftover from a growth that never reached the manifest
            std::fs::remove_file(&path)?;
        }
        let map = Bitmap::from_path(&path, bytes, true, true)?;
        self.next_index += 1;
        Ok(map)
    }
}
