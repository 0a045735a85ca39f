use crate::consts::{MANIFEST_FILE, MANIFEST_VERSION};
use crate::errors::{Result, SbfError};
use crate::scalable::SbfParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One chain member as recorded on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    /// Relative to the store directory.
    #[serde(with = "path_serde")]
    pub path: PathBuf,
    pub bytes: u64,
    pub k: u32,
    pub capacity: u64,
    pub fp_probability: f64,
}

mod path_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::path::PathBuf;

    pub fn serialize<S: Serializer>(p: &PathBuf, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&p.to_string_lossy())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PathBuf, D::Error> {
        let s = String::deserialize(d)?;
        Ok(PathBuf::from(s))
    }
}

/// Chain metadata: everything needed to rebuild the filters from their
/// bitmap files. Filters are listed oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainManifest {
    pub version: u32,
    pub params: SbfParams,
    /// Estimated item count at the last flush.
    #[serde(default)]
    pub size: u64,
    pub filters: Vec<FilterRecord>,
}

impl ChainManifest {
    pub fn new(params: SbfParams) -> Self {
        Self { version: MANIFEST_VERSION, params, size: 0, filters: vec![] }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// `None` when the directory holds no manifest yet.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let p = Self::path(dir);
        if !p.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(p)?;
        let m: ChainManifest = serde_json::from_str(&s)?;
        if m.version != MANIFEST_VERSION {
            return Err(SbfError::Corrupt(format!("unsupported manifest version {}", m.version)));
        }
        Ok(Some(m))
    }

    /// Write to a temp file beside the manifest, sync, rename over it.
    pub fn save_atomic(&self, dir: &Path) -> Result<()> {
        let p = Self::path(dir);
        let mut tmp =
            tempfile::Builder::new().prefix("manifest_").suffix(".tmp").tempfile_in(dir)?;
        tmp.as_file_mut().write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&p)?;
        let _ = fsync_dir(dir);
        Ok(())
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let f = fs::OpenOptions::new().read(true).custom_flags(libc::O_DIRECTORY).open(dir)?;
    f.sync_all()
}
#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> std::io::Result<()> { Ok(()) }
