use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Per-request scratch directory holding the uploaded PDF, the credential
/// container and the signed output.
///
/// Everything under it is removed when the value is dropped, on success,
/// error or unwinding alike.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Creates the directory under `root`, or under the system temp dir when
    /// no root is configured.
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sign-request-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `bytes` to `name` inside the scratch directory.
    pub fn stage(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Removes the directory now, surfacing any I/O error instead of
    /// swallowing it in `Drop`.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
