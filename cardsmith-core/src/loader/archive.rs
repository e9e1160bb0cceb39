use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::CardResult;

/// A temporary extraction directory that removes itself on drop unless the
/// caller takes ownership with [`keep`](Self::keep).
#[derive(Debug)]
pub struct TempDirGuard {
    path: PathBuf,
    armed: bool,
}

impl TempDirGuard {
    pub fn create() -> CardResult<Self> {
        let dir = tempfile::Builder::new().prefix("cardsmith-").tempdir()?;
        Ok(Self {
            path: dir.keep(),
            armed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard; the directory now outlives it and the caller is
    /// responsible for cleanup.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            log::warn!(
                "failed to remove temporary directory '{}': {err}",
                self.path.display()
            );
        }
    }
}

/// Unpacks a zip archive into `dest`. Blocking; callers run it on a worker
/// thread.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> CardResult<()> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}
