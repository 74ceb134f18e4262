use std::{
    fs,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use ledger_format::{DataFormat, Hash256};
use tracing::trace;

use crate::{
    entry::{BucketEntry, BucketMetaEntry, LedgerEntry, LedgerKey},
    error::BucketError,
    protocol::ProtocolVersion,
};

/// A single content-addressed, sorted run of `BucketEntry` records.
///
/// A bucket is either the distinguished empty bucket (no backing file,
/// `hash() == Hash256::ZERO`, see `ledger_format::Hash256::ZERO` for why this
/// is not `Hash256::of(&[])`) or a file on disk whose name is the hex of its
/// content hash. Buckets are immutable once constructed: the only way to get
/// a new one is `Bucket::write_from_sorted` (fresh construction, used for
/// inbound batches) or the merge engine in `merge.rs` (derived construction).
#[derive(Debug, Clone)]
pub struct Bucket {
    inner: Arc<BucketInner>,
}

#[derive(Debug)]
struct BucketInner {
    hash: Hash256,
    path: Option<PathBuf>,
}

impl Bucket {
    /// The distinguished empty bucket: no file, hashes to `Hash256::ZERO`.
    pub fn empty() -> Self {
        Bucket {
            inner: Arc::new(BucketInner {
                hash: Hash256::ZERO,
                path: None,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.path.is_none()
    }

    pub fn hash(&self) -> Hash256 {
        self.inner.hash
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Number of live handles sharing this bucket's backing data, including
    /// this one. `BucketManager::forget_unreferenced_buckets` uses this to
    /// find cache entries nothing outside the cache still points at.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Wrap an existing, already-validated bucket file without rewriting it.
    /// Used when reopening a bucket named by a persisted `HistoryArchiveState`.
    pub fn from_existing_file(hash: Hash256, path: PathBuf) -> Self {
        Bucket {
            inner: Arc::new(BucketInner {
                hash,
                path: Some(path),
            }),
        }
    }

    /// Write a new bucket file from an already-sorted, already-deduplicated
    /// sequence of entries (ascending by `BucketEntry::cmp`, META first if
    /// present). Returns the empty bucket without touching disk if `entries`
    /// is empty.
    ///
    /// The file is written to a `.tmp` sibling under `dir` and renamed into
    /// place under its content hash once the writer is flushed, so a crash
    /// mid-write can never leave a bucket file at a hash that doesn't match
    /// its content.
    pub fn write_from_sorted(
        dir: &Path,
        entries: &[BucketEntry],
    ) -> Result<Self, BucketError> {
        if entries.is_empty() {
            return Ok(Bucket::empty());
        }

        let mut buf = Vec::new();
        for entry in entries {
            entry.write_data(&mut buf)?;
        }
        let hash = Hash256::of(&buf);

        let final_path = bucket_path(dir, &hash);
        if final_path.exists() {
            // Identical content already on disk under this hash; nothing to do.
            return Ok(Bucket::from_existing_file(hash, final_path));
        }

        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!("{}.tmp", hash.to_hex()));
        {
            let file = fs::File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        trace!(hash = %hash, path = ?final_path, "wrote bucket");

        Ok(Bucket::from_existing_file(hash, final_path))
    }

    /// Serialize an incoming per-ledger batch into a fresh bucket
    /// (spec.md §4.1). Rejects a key appearing in more than one of the three
    /// lists, and an INIT entry below the protocol that introduces it.
    pub fn fresh(
        dir: &Path,
        protocol: ProtocolVersion,
        init: Vec<LedgerEntry>,
        live: Vec<LedgerEntry>,
        dead: Vec<LedgerKey>,
    ) -> Result<Self, BucketError> {
        use std::collections::HashSet;

        if !protocol.supports_init_and_meta() && !init.is_empty() {
            return Err(BucketError::ProtocolViolation(
                "INIT entries require a protocol at or above the INIT/META gate".to_string(),
            ));
        }

        let mut seen: HashSet<&LedgerKey> = HashSet::new();
        for key in init
            .iter()
            .map(|e| &e.key)
            .chain(live.iter().map(|e| &e.key))
            .chain(dead.iter())
        {
            if !seen.insert(key) {
                return Err(BucketError::BatchInvariantViolated(format!(
                    "key {key:?} appears in more than one of (init, live, dead)"
                )));
            }
        }

        let mut entries = Vec::with_capacity(init.len() + live.len() + dead.len() + 1);
        if protocol.supports_init_and_meta() {
            entries.push(BucketEntry::Meta(BucketMetaEntry {
                ledger_version: protocol,
            }));
        }
        entries.extend(init.into_iter().map(BucketEntry::Init));
        entries.extend(live.into_iter().map(BucketEntry::Live));
        entries.extend(dead.into_iter().map(BucketEntry::Dead));
        entries.sort();

        Bucket::write_from_sorted(dir, &entries)
    }

    /// Read and decode every entry in this bucket, in file order (which is
    /// sort order). The empty bucket yields no entries.
    pub fn entries(&self) -> Result<Vec<BucketEntry>, BucketError> {
        let Some(path) = &self.inner.path else {
            return Ok(Vec::new());
        };
        let file = fs::File::open(path).map_err(|e| BucketError::BucketCorrupt {
            path: Some(path.clone()),
            reason: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);
        let mut out = Vec::new();
        loop {
            match BucketEntry::read_data(&mut reader, &()) {
                Ok(entry) => out.push(entry),
                Err(ledger_format::DataReadError::Io(ref io))
                    if io.kind() == std::io::ErrorKind::UnexpectedEof && peek_eof(&mut reader) =>
                {
                    break
                }
                Err(e) => {
                    return Err(BucketError::BucketCorrupt {
                        path: Some(path.clone()),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Open a streaming iterator over this bucket's entries, for use as a
    /// merge input. The empty bucket yields an iterator that is immediately
    /// exhausted.
    pub fn open_input_iterator(&self) -> Result<BucketIterator, BucketError> {
        let Some(path) = &self.inner.path else {
            return Ok(BucketIterator { reader: None });
        };
        let file = fs::File::open(path).map_err(|e| BucketError::BucketCorrupt {
            path: Some(path.clone()),
            reason: e.to_string(),
        })?;
        Ok(BucketIterator {
            reader: Some(BufReader::new(file)),
        })
    }
}

fn peek_eof<R: Read>(reader: &mut R) -> bool {
    let mut byte = [0u8; 1];
    matches!(reader.read(&mut byte), Ok(0))
}

pub fn bucket_path(dir: &Path, hash: &Hash256) -> PathBuf {
    dir.join(format!("bucket-{}.xdr", hash.to_hex()))
}

/// A streaming, single-pass cursor over one bucket's entries, used as an
/// input leg of the k-way merge in `merge.rs`.
pub struct BucketIterator {
    reader: Option<BufReader<fs::File>>,
}

impl Iterator for BucketIterator {
    type Item = Result<BucketEntry, BucketError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        match BucketEntry::read_data(reader, &()) {
            Ok(entry) => Some(Ok(entry)),
            Err(ledger_format::DataReadError::Io(ref io))
                if io.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                self.reader = None;
                None
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}
