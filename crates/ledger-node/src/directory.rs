use std::{
    fs,
    path::{Path, PathBuf},
};

use ledger_format::Hash256;

use crate::error::ManagerError;

const FILE_PREFIX: &str = "bucket-";
const FILE_SUFFIX: &str = ".xdr";

/// The on-disk bucket directory: path-building, filename parsing, and
/// adopting an externally-produced file into its canonical
/// content-addressed name. Split out of `BucketManager` so the manager's
/// caching/GC/worker-pool logic can be exercised without a real
/// filesystem's directory-listing behavior in every test — only `scan` and
/// `adopt` here ever touch `std::fs`.
#[derive(Debug, Clone)]
pub struct BucketDirectory {
    root: PathBuf,
}

impl BucketDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ManagerError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(BucketDirectory { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The canonical path a bucket with this hash would live at, whether or
    /// not it currently exists.
    pub fn bucket_path(&self, hash: &Hash256) -> PathBuf {
        self.root.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", hash.to_hex()))
    }

    /// Recover the hash encoded in a bucket's file name, rejecting anything
    /// that doesn't match the `bucket-<hex>.xdr` shape `bucket_path` writes.
    pub fn parse_filename(name: &str) -> Option<Hash256> {
        let hex = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        hex.parse().ok()
    }

    /// List every bucket hash currently present, by parsing directory entry
    /// names rather than reading file contents. Used by a node rebuilding
    /// its interning cache from whatever survived an unclean shutdown,
    /// without needing a `HistoryArchiveState` to know what to look for.
    pub fn scan(&self) -> Result<Vec<Hash256>, ManagerError> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(hash) = Self::parse_filename(&name) {
                found.push(hash);
            }
        }
        Ok(found)
    }

    /// Hash `source`'s contents and rename it into its canonical path,
    /// discarding `source` if a bucket with that hash is already present
    /// (two different inputs can legitimately produce byte-identical
    /// content). Returns the hash and the final path.
    pub fn adopt(&self, source: &Path) -> Result<(Hash256, PathBuf), ManagerError> {
        let contents = fs::read(source)?;
        let hash = Hash256::of(&contents);
        let final_path = self.bucket_path(&hash);
        if !final_path.exists() {
            fs::rename(source, &final_path)?;
        } else {
            fs::remove_file(source)?;
        }
        Ok((hash, final_path))
    }
}
