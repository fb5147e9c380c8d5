//! Persistent ledger storage.
//!
//! [`StateStore`] owns the JSON state document.  Reads go through
//! [`StateStore::load`] / [`StateStore::get`]; the only write primitive is
//! [`StateStore::transact`], which validates, backs up and atomically
//! replaces the file under an exclusive advisory lock.
pub mod document;

use std::cell::{Cell, RefCell};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt as _;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;

pub use document::StateDocument;

use crate::error::StateError;
use crate::resources::fs::{self as fs_util, sibling};

/// Default ledger location.
pub const DEFAULT_STATE_PATH: &str = "/var/lib/smb-zfs.state";

/// Permission bits for the ledger and its backup.
const STATE_FILE_MODE: u32 = 0o600;

/// File-backed ledger with backup, atomic replace and advisory locking.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock_file: RefCell<Option<File>>,
    lock_depth: Cell<usize>,
}

/// Guard returned by [`StateStore::lock`]; the lock is released when the
/// outermost guard is dropped.
#[derive(Debug)]
#[must_use = "the state lock is released as soon as the guard is dropped"]
pub struct StateLock<'a> {
    store: &'a StateStore,
}

impl Drop for StateLock<'_> {
    fn drop(&mut self) {
        let depth = self.store.lock_depth.get().saturating_sub(1);
        self.store.lock_depth.set(depth);
        if depth == 0
            && let Some(file) = self.store.lock_file.borrow_mut().take()
            && let Err(e) = FileExt::unlock(&file)
        {
            tracing::debug!("failed to release state lock: {e}");
        }
    }
}

impl StateStore {
    /// Create a store for the ledger at `path`.  Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_file: RefCell::new(None),
            lock_depth: Cell::new(0),
        }
    }

    /// Ledger path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling holding the previous ledger contents.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "backup")
    }

    /// Sibling used for advisory locking.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    /// Acquire the exclusive advisory lock.  Re-entrant: nested calls while
    /// the lock is held only bump a counter.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Locked`] if another process holds the lock and
    /// [`StateError::Io`] if the lock file cannot be opened.
    pub fn lock(&self) -> Result<StateLock<'_>, StateError> {
        if self.lock_depth.get() == 0 {
            let lock_path = self.lock_path();
            fs_util::ensure_parent_dir(&lock_path).map_err(|e| StateError::io(&lock_path, e))?;
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(STATE_FILE_MODE)
                .open(&lock_path)
                .map_err(|e| StateError::io(&lock_path, e))?;
            FileExt::try_lock_exclusive(&file)
                .map_err(|_| StateError::Locked { path: lock_path })?;
            *self.lock_file.borrow_mut() = Some(file);
        }
        self.lock_depth.set(self.lock_depth.get() + 1);
        Ok(StateLock { store: self })
    }

    /// Load the ledger.
    ///
    /// Returns `None` when the file is absent or the document has not been
    /// initialised.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Corrupt`] if the file exists but cannot be parsed
    /// or violates an invariant.
    pub fn load(&self) -> Result<Option<StateDocument>, StateError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(None);
        };
        let doc = self.parse(&bytes)?;
        Ok(doc.initialized.then_some(doc))
    }

    /// Read the value at a dotted key path (`"users.alice.quota"`), falling
    /// back to `default` when the file, key or value type is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Corrupt`] if the file exists but is not JSON.
    pub fn get<T: DeserializeOwned>(&self, key_path: &str, default: T) -> Result<T, StateError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(default);
        };
        let root: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e.to_string()))?;
        let value = key_path
            .split('.')
            .filter(|k| !k.is_empty())
            .try_fold(&root, |node, key| node.get(key));
        Ok(value
            .filter(|v| !v.is_null())
            .and_then(|v| T::deserialize(v).ok())
            .unwrap_or(default))
    }

    /// Apply `mutator` to a copy of the ledger and persist the result.
    ///
    /// The sequence is: lock, read and validate the current document, copy
    /// it to the backup, mutate a clone, validate the candidate, atomically
    /// replace the file.  If the mutator or validation fails the file is not
    /// touched; if the final write fails the previous contents are restored.
    ///
    /// # Errors
    ///
    /// Returns the mutator's error, or a [`StateError`] converted into `E`.
    pub fn transact<T, E, F>(&self, mutator: F) -> Result<T, E>
    where
        F: FnOnce(&mut StateDocument) -> Result<T, E>,
        E: From<StateError>,
    {
        let _guard = self.lock()?;

        let previous = self.read_bytes()?;
        let current = match previous.as_deref() {
            Some(bytes) => self.parse(bytes)?,
            None => StateDocument::default(),
        };
        if let Some(bytes) = previous.as_deref() {
            write_atomic(&self.backup_path(), bytes)?;
        }

        let mut candidate = current;
        let value = mutator(&mut candidate)?;
        candidate.validate()?;

        let mut bytes = serde_json::to_vec_pretty(&candidate).map_err(StateError::from)?;
        bytes.push(b'\n');
        if let Err(err) = write_atomic(&self.path, &bytes) {
            if let Some(original) = previous.as_deref()
                && let Err(restore) = write_atomic(&self.path, original)
            {
                tracing::error!("failed to restore ledger from backup: {restore}");
            }
            return Err(err.into());
        }
        tracing::debug!("ledger written to {}", self.path.display());
        Ok(value)
    }

    /// Delete the ledger, its backup and its lock file.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if a file exists but cannot be removed.
    pub fn destroy(&self) -> Result<(), StateError> {
        for path in [self.path.clone(), self.backup_path(), self.lock_path()] {
            if fs_util::remove_existing(&path).map_err(|e| StateError::io(&path, e))? {
                tracing::debug!("removed {}", path.display());
            }
        }
        Ok(())
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>, StateError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::io(&self.path, e)),
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<StateDocument, StateError> {
        let doc: StateDocument =
            serde_json::from_slice(bytes).map_err(|e| self.corrupt(e.to_string()))?;
        doc.validate().map_err(|e| self.corrupt(e.to_string()))?;
        Ok(doc)
    }

    fn corrupt(&self, reason: String) -> StateError {
        StateError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StateError> {
    fs_util::write_atomic(path, content, STATE_FILE_MODE).map_err(|e| StateError::io(path, e))
}
