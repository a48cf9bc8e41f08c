//! File system utils.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::FileExt;

pub struct FsHandler;

impl FsHandler {
    /// Create the parent directory of `path` if it doesn't exist.
    pub fn create_parent_directory(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::debug!("Created directory: {}", parent.display());
            }
        }
        Ok(())
    }

    /// Write `contents` to `path` so that readers only ever see the old or the new file.
    ///
    /// The data goes to a sibling temporary file which is synced and then renamed over the
    /// destination.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let tmp_path = Self::sibling(path, "tmp");

        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, path)
    }

    /// Take an exclusive advisory lock next to `path`.
    ///
    /// The lock is held for as long as the returned file stays open. Returns `Ok(None)` when
    /// another process already holds it.
    pub fn try_lock(path: &Path) -> std::io::Result<Option<File>> {
        let lock_path = Self::sibling(path, "lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(file)),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `ledger.json` -> `ledger.json.<suffix>`
    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        path.with_file_name(name)
    }
}
