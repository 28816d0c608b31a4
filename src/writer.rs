use crate::error::WriteError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Destination for serialized fragments.
///
/// Not assumed safe for concurrent writers; the loader serializes access.
pub trait Writer: Send {
    fn write(&mut self, fragment: &str) -> Result<(), WriteError>;

    /// Releases the underlying resource. Safe to call more than once.
    fn close(&mut self);
}

/// Writes fragments to a local file, truncating it on open.
pub struct LocalFileWriter {
    path: PathBuf,
    inner: Option<BufWriter<File>>,
}

impl LocalFileWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, WriteError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| WriteError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            inner: Some(BufWriter::with_capacity(128 * 1024, file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Writer for LocalFileWriter {
    fn write(&mut self, fragment: &str) -> Result<(), WriteError> {
        let inner = self.inner.as_mut().ok_or(WriteError::Closed)?;
        inner.write_all(fragment.as_bytes())?;
        // a failed flush belongs to this fragment
        inner.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            if let Err(e) = inner.flush() {
                warn!(path = ?self.path, error = %e, "Failed to flush output on close");
            }
            debug!(path = ?self.path, "Output closed");
        }
    }
}

impl Drop for LocalFileWriter {
    fn drop(&mut self) {
        self.close();
    }
}
