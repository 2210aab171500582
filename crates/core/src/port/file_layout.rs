// File Layout Port
// Filesystem operations used by copy/mkdir export steps

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file pattern: {0}")]
    Pattern(String),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to write archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
}

/// Filesystem port for the export pipeline
#[async_trait]
pub trait FileLayout: Send + Sync {
    /// Create `dir` and any missing parents
    async fn ensure_dir(&self, dir: &Path) -> Result<(), LayoutError>;

    /// Copy regular files directly inside `from` whose file name matches `pattern`
    /// into `to` (created if missing). Returns the number of files copied.
    ///
    /// # Errors
    /// - LayoutError::NotADirectory if `from` is not a directory
    /// - LayoutError::Pattern if `pattern` is not a valid glob
    async fn copy_matching(&self, from: &Path, pattern: &str, to: &Path)
        -> Result<usize, LayoutError>;

    /// Write every regular file under `from` (recursively) into the zip file `to`,
    /// replacing it if present. Entry names are relative to `from`.
    /// Returns the number of files archived.
    ///
    /// # Errors
    /// - LayoutError::NotADirectory if `from` is not a directory
    /// - LayoutError::Archive if the zip file cannot be written
    async fn archive_dir(&self, from: &Path, to: &Path) -> Result<usize, LayoutError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Recorded layout operation
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LayoutCall {
        EnsureDir(PathBuf),
        Copy {
            from: PathBuf,
            pattern: String,
            to: PathBuf,
        },
        Archive {
            from: PathBuf,
            to: PathBuf,
        },
    }

    /// Records calls; every copy or archive reports `files_per_copy` files
    #[derive(Default)]
    pub struct MockFileLayout {
        calls: Mutex<Vec<LayoutCall>>,
        files_per_copy: usize,
        fail_copies: bool,
    }

    impl MockFileLayout {
        pub fn new(files_per_copy: usize) -> Self {
            Self {
                files_per_copy,
                ..Self::default()
            }
        }

        /// Every copy or archive fails with NotADirectory
        pub fn failing() -> Self {
            Self {
                fail_copies: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<LayoutCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FileLayout for MockFileLayout {
        async fn ensure_dir(&self, dir: &Path) -> Result<(), LayoutError> {
            self.calls
                .lock()
                .unwrap()
                .push(LayoutCall::EnsureDir(dir.to_path_buf()));
            Ok(())
        }

        async fn copy_matching(
            &self,
            from: &Path,
            pattern: &str,
            to: &Path,
        ) -> Result<usize, LayoutError> {
            self.calls.lock().unwrap().push(LayoutCall::Copy {
                from: from.to_path_buf(),
                pattern: pattern.to_string(),
                to: to.to_path_buf(),
            });
            if self.fail_copies {
                return Err(LayoutError::NotADirectory(from.to_path_buf()));
            }
            Ok(self.files_per_copy)
        }

        async fn archive_dir(&self, from: &Path, to: &Path) -> Result<usize, LayoutError> {
            self.calls.lock().unwrap().push(LayoutCall::Archive {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
            if self.fail_copies {
                return Err(LayoutError::NotADirectory(from.to_path_buf()));
            }
            Ok(self.files_per_copy)
        }
    }
}
