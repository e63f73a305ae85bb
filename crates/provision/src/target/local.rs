//! Local filesystem target.
//!
//! Used when the deployment runs on the same machine as the artifact, and by
//! tests that want a real filesystem under a temp dir.

use super::{RemoteTarget, parent};
use crate::error::RemoteIoError;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Mode of the published artifact. It holds secrets, so no world access.
#[cfg(unix)]
const ARTIFACT_MODE: u32 = 0o640;

/// Target backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalTarget;

impl LocalTarget {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn write_temp_then_rename(path: &str, contents: &[u8]) -> io::Result<()> {
        let dir = Path::new(parent(path));
        let mut tmp = tempfile::Builder::new()
            .prefix(".confseed-")
            .suffix(".tmp")
            .tempfile_in(dir)?;

        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(ARTIFACT_MODE))?;
        }

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl RemoteTarget for LocalTarget {
    fn describe(&self) -> String {
        "localhost".to_string()
    }

    fn exists(&self, path: &str) -> Result<bool, RemoteIoError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RemoteIoError::Probe {
                target: self.describe(),
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, RemoteIoError> {
        fs::read(path).map_err(|e| RemoteIoError::Read {
            target: self.describe(),
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn create_dir_all(&self, path: &str) -> Result<(), RemoteIoError> {
        fs::create_dir_all(path).map_err(|e| RemoteIoError::CreateDir {
            target: self.describe(),
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn write_atomic(&self, path: &str, contents: &[u8]) -> Result<(), RemoteIoError> {
        Self::write_temp_then_rename(path, contents).map_err(|e| RemoteIoError::Publish {
            target: self.describe(),
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), RemoteIoError> {
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| RemoteIoError::Copy {
                target: self.describe(),
                from: from.to_string(),
                to: to.to_string(),
                message: e.to_string(),
            })
    }
}
