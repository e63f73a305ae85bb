//! Remote target abstraction.
//!
//! The provisioner never touches a host directly. It goes through
//! [`RemoteTarget`], implemented by the CLI's SSH transport, by
//! [`LocalTarget`] for the local filesystem, and by [`MemoryTarget`] for
//! tests.
//!
//! # Testing
//!
//! ```
//! use provision::{MemoryTarget, RemoteTarget};
//!
//! let target = MemoryTarget::new().with_file("/srv/shared/config/app.conf", "x");
//! assert!(target.exists("/srv/shared/config/app.conf").unwrap());
//! assert_eq!(target.write_count(), 0);
//! ```

pub mod local;

pub use local::LocalTarget;

use crate::error::RemoteIoError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Filesystem operations on a deployment target.
///
/// Paths are absolute POSIX paths on the target.
pub trait RemoteTarget {
    /// Human-readable target name for messages (e.g. `deploy@web1`).
    fn describe(&self) -> String;

    /// Whether a regular file exists at `path`.
    fn exists(&self, path: &str) -> Result<bool, RemoteIoError>;

    /// Read the file at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteIoError>;

    /// Create `path` and its parents.
    fn create_dir_all(&self, path: &str) -> Result<(), RemoteIoError>;

    /// Replace `path` with `contents` so readers see either the old file or
    /// the complete new one, never a partial write.
    fn write_atomic(&self, path: &str, contents: &[u8]) -> Result<(), RemoteIoError>;

    /// Copy a file on the target.
    fn copy(&self, from: &str, to: &str) -> Result<(), RemoteIoError>;
}

/// Parent directory of a POSIX path
pub(crate) fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => ".",
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    operations: Vec<String>,
    writes: usize,
    fail_writes: Option<String>,
}

/// In-memory target for tests.
///
/// Clones share state, so a test can hand one clone to the provisioner and
/// inspect the other afterwards. Writes require the parent directory to
/// exist, like a real filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory and its parents.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        add_dirs(&mut self.lock(), path);
        self
    }

    /// Add a file (and its parent directories).
    #[must_use]
    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.lock();
            add_dirs(&mut state, parent(path));
            state.files.insert(path.to_string(), contents.into());
        }
        self
    }

    /// Make every write operation fail with `message`.
    #[must_use]
    pub fn failing_writes(self, message: &str) -> Self {
        self.lock().fail_writes = Some(message.to_string());
        self
    }

    /// Current contents of a file.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Every path currently holding a file.
    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Number of mkdir, write and copy calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Every call in order, e.g. `exists /srv/x`.
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_write(&self, op: String) -> Result<MutexGuard<'_, MemoryState>, String> {
        let mut state = self.lock();
        state.operations.push(op);
        state.writes += 1;
        if let Some(message) = state.fail_writes.clone() {
            return Err(message);
        }
        Ok(state)
    }
}

fn add_dirs(state: &mut MemoryState, path: &str) {
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        state.dirs.insert(current.clone());
    }
}

fn dir_exists(state: &MemoryState, path: &str) -> bool {
    path == "/" || state.dirs.contains(path)
}

impl RemoteTarget for MemoryTarget {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteIoError> {
        let mut state = self.lock();
        state.operations.push(format!("exists {path}"));
        Ok(state.files.contains_key(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteIoError> {
        let mut state = self.lock();
        state.operations.push(format!("read {path}"));
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteIoError::Read {
                target: "memory".to_string(),
                path: path.to_string(),
                message: "No such file or directory".to_string(),
            })
    }

    fn create_dir_all(&self, path: &str) -> Result<(), RemoteIoError> {
        let mut state = self
            .begin_write(format!("mkdir {path}"))
            .map_err(|message| RemoteIoError::CreateDir {
                target: "memory".to_string(),
                path: path.to_string(),
                message,
            })?;
        add_dirs(&mut state, path);
        Ok(())
    }

    fn write_atomic(&self, path: &str, contents: &[u8]) -> Result<(), RemoteIoError> {
        let publish_error = |message: String| RemoteIoError::Publish {
            target: "memory".to_string(),
            path: path.to_string(),
            message,
        };

        let mut state = self
            .begin_write(format!("write {path}"))
            .map_err(publish_error)?;
        if !dir_exists(&state, parent(path)) {
            return Err(publish_error("No such file or directory".to_string()));
        }
        state.files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), RemoteIoError> {
        let copy_error = |message: &str| RemoteIoError::Copy {
            target: "memory".to_string(),
            from: from.to_string(),
            to: to.to_string(),
            message: message.to_string(),
        };

        let mut state = self
            .begin_write(format!("copy {from} {to}"))
            .map_err(|message| copy_error(&message))?;
        if !dir_exists(&state, parent(to)) {
            return Err(copy_error("No such file or directory"));
        }
        let contents = state
            .files
            .get(from)
            .cloned()
            .ok_or_else(|| copy_error("No such file or directory"))?;
        state.files.insert(to.to_string(), contents);
        Ok(())
    }
}
