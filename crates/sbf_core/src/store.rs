use crate::allocator::{filter_file_name, DirAllocator};
use crate::bitmap::Bitmap;
use crate::errors::{Result, SbfError};
use crate::filter::{AddOutcome, BloomFilter};
use crate::manifest::{ChainManifest, FilterRecord};
use crate::scalable::{SbfParams, ScalableBloomFilter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A scalable filter persisted in a directory: one bitmap file per filter
/// plus `manifest.json` describing the chain.
///
/// Bitmaps are written through their maps; the manifest is rewritten when
/// the chain grows and on a flush that changed something.
#[derive(Debug)]
pub struct SbfStore {
    dir: PathBuf,
    manifest: ChainManifest,
    sbf: ScalableBloomFilter,
}

impl SbfStore {
    /// Initializes a new store. Fails if `dir` already holds a manifest.
    pub fn create(dir: impl AsRef<Path>, params: SbfParams) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        params.validate()?;
        fs::create_dir_all(&dir)?;
        if ChainManifest::path(&dir).exists() {
            return Err(SbfError::invalid(format!("store already exists at {}", dir.display())));
        }

        let sbf = ScalableBloomFilter::with_allocator(params, DirAllocator::new(&dir, 0))?;
        let mut store = Self { manifest: ChainManifest::new(params), dir, sbf };
        store.record_new_filters();
        store.manifest.save_atomic(&store.dir)?;
        info!(dir = %store.dir.display(), ?params, "created filter store");
        Ok(store)
    }

    /// Reopens every bitmap listed in the manifest and adopts the chain.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let manifest = ChainManifest::load(&dir)?
            .ok_or_else(|| SbfError::NotFound(ChainManifest::path(&dir)))?;
        manifest.params.validate()?;
        if manifest.filters.is_empty() {
            return Err(SbfError::Corrupt("manifest lists no filters".into()));
        }

        let mut filters = Vec::with_capacity(manifest.filters.len());
        for (i, rec) in manifest.filters.iter().enumerate() {
            filters.push(Self::reopen_filter(&dir, &manifest.params, i, rec)?);
        }
        let next = filters.len();
        let alloc = Box::new(DirAllocator::new(&dir, next));
        let sbf = ScalableBloomFilter::new(manifest.params, Some(alloc), filters)?;
        info!(dir = %dir.display(), filters = next, "opened filter store");
        Ok(Self { dir, manifest, sbf })
    }

    fn reopen_filter(
        dir: &Path,
        params: &SbfParams,
        index: usize,
        rec: &FilterRecord,
    ) -> Result<BloomFilter> {
        let want = params.filter_params(index)?;
        if rec.bytes != want.bytes || rec.k != want.k {
            return Err(SbfError::Corrupt(format!(
                "filter {index}: recorded {} bytes/k={}, params give {} bytes/k={}",
                rec.bytes, rec.k, want.bytes, want.k
            )));
        }
        let path = dir.join(&rec.path);
        let map = Bitmap::from_path(&path, rec.bytes, false, false)?;
        let on_disk = fs::metadata(&path)?.len();
        if on_disk != rec.bytes {
            return Err(SbfError::Corrupt(format!(
                "{}: {on_disk} bytes on disk, manifest says {}",
                path.display(),
                rec.bytes
            )));
        }
        Ok(BloomFilter::new(map, rec.k, true))
    }

    /// Appends manifest records for filters the chain gained since the last
    /// save.
    fn record_new_filters(&mut self) {
        let params = *self.sbf.params();
        for i in self.manifest.filters.len()..self.sbf.filter_count() {
            let f = &self.sbf.filters()[i];
            self.manifest.filters.push(FilterRecord {
                path: PathBuf::from(filter_file_name(i)),
                bytes: f.byte_size(),
                k: f.k(),
                capacity: params.designed_capacity(i),
                fp_probability: params.designed_fp_probability(i),
            });
        }
    }

    pub fn add(&mut self, key: &[u8]) -> Result<AddOutcome> {
        let before = self.sbf.filter_count();
        let outcome = self.sbf.add(key)?;
        if self.sbf.filter_count() != before {
            self.record_new_filters();
            self.manifest.save_atomic(&self.dir)?;
        }
        Ok(outcome)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.sbf.contains(key)
    }

    pub fn size(&self) -> u64 {
        self.sbf.size()
    }

    pub fn capacity(&self) -> u64 {
        self.sbf.total_capacity()
    }

    pub fn byte_size(&self) -> u64 {
        self.sbf.total_byte_size()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &ChainManifest {
        &self.manifest
    }

    pub fn filter(&self) -> &ScalableBloomFilter {
        &self.sbf
    }

    /// Syncs dirty bitmaps, then rewrites the manifest if a bitmap was synced
    /// or the size estimate moved. Returns how many bitmaps were synced.
    pub fn flush(&mut self) -> Result<usize> {
        let synced = self.sbf.flush()?;
        let size = self.sbf.size();
        if synced > 0 || size != self.manifest.size {
            self.manifest.size = size;
            self.manifest.save_atomic(&self.dir)?;
        }
        Ok(synced)
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.sbf.close().map_err(|e| e.error)?;
        info!(dir = %self.dir.display(), size = self.manifest.size, "closed filter store");
        Ok(())
    }
}
