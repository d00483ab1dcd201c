//! File-based snapshot persistence.
//!
//! # File Format
//!
//! ```text
//! magic (4 bytes): "FCSN"
//! version (1 byte): 1
//! entries (variable): bincode-encoded HashMap<String, Entry>
//! ```
//!
//! Each value is encoded with its enum tag, so a snapshot can be decoded
//! without knowing in advance which types were stored.

use crate::error::PersistError;
use crate::persist::{drop_expired, Persister};
use crate::storage::Snapshot;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// File format magic bytes
const MAGIC: &[u8; 4] = b"FCSN";
/// Current file format version
const VERSION: u8 = 1;
/// Magic plus version byte
const HEADER_LEN: usize = MAGIC.len() + 1;

/// Persists snapshots to a single file.
///
/// Saves write a sibling `<path>.tmp` file, sync it, and rename it over the
/// snapshot, so readers see either the old or the new snapshot in full.
///
/// Saves through the same persister, or any of its clones, run one at a time
/// since they share the temp file.
#[derive(Debug, Clone)]
pub struct FilePersister {
    /// Path to the snapshot file
    path: PathBuf,
    /// Held for the whole temp-write-rename sequence
    write_lock: Arc<Mutex<()>>,
}

impl FilePersister {
    /// Creates a persister for the given snapshot path.
    ///
    /// Nothing is touched on disk until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl Persister for FilePersister {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Snapshot, PersistError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => Bytes::from(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot file, starting empty");
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.is_empty() {
            debug!("Snapshot file is empty, starting empty");
            return Ok(Snapshot::new());
        }

        let mut items = decode(contents)?;
        let dropped = drop_expired(&mut items);

        info!(count = items.len(), dropped, "Loaded snapshot");
        Ok(items)
    }

    #[instrument(skip(self, items), fields(path = %self.path.display(), count = items.len()))]
    fn save(&self, items: &Snapshot) -> Result<(), PersistError> {
        let contents = encode(items)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Write atomically (write to temp, then rename)
        let temp_path = self.temp_path();
        if let Err(e) = replace_with(&temp_path, &self.path, &contents) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(error = %cleanup, "Failed to remove temp snapshot file");
                }
            }
            return Err(e.into());
        }

        debug!(bytes = contents.len(), "Snapshot saved");
        Ok(())
    }
}

fn replace_with(temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)
}

fn encode(items: &Snapshot) -> Result<Bytes, PersistError> {
    let payload = bincode::serialize(items)?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_slice(&payload);

    Ok(buf.freeze())
}

fn decode(mut contents: Bytes) -> Result<Snapshot, PersistError> {
    if contents.len() < HEADER_LEN {
        return Err(PersistError::Truncated);
    }

    // Verify magic
    let magic = contents.split_to(MAGIC.len());
    if &magic[..] != MAGIC {
        return Err(PersistError::BadMagic);
    }

    // Check version
    let version = contents.get_u8();
    if version != VERSION {
        return Err(PersistError::UnsupportedVersion {
            expected: VERSION,
            found: version,
        });
    }

    Ok(bincode::deserialize(&contents)?)
}
