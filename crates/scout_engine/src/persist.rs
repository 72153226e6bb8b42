//! Crash-safe replacement of the state document.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to create state directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` if missing. Writability is left to the first write.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(PersistError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Owns one file and replaces it whole: content goes to a synced temp file in
/// the same directory, which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
    target: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: &Path, filename: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            target: dir.join(filename),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn write(&self, content: &[u8]) -> Result<(), PersistError> {
        if !self.dir.is_dir() {
            ensure_state_dir(&self.dir)?;
        }
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.target).map_err(|e| PersistError::Io(e.error))?;
        Ok(())
    }

    /// Renames the target to `<target>.<suffix>`, replacing an older copy.
    /// `None` when there was no target to move.
    pub fn move_aside(&self, suffix: &str) -> Result<Option<PathBuf>, PersistError> {
        let mut name = self.target.clone().into_os_string();
        name.push(".");
        name.push(suffix);
        let backup = PathBuf::from(name);
        match fs::rename(&self.target, &backup) {
            Ok(()) => Ok(Some(backup)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
