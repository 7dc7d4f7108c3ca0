//! Evidence buffer: the text staging area every stage reads and rewrites.
//!
//! Stages either append blocks (acquisition keeps an audit trail) or replace the
//! whole content (structuring and enrichment only trust the latest write). One
//! buffer belongs to exactly one pipeline run, so no locking is involved.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("Buffer I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Staging area shared by the stages of one pipeline run.
pub trait EvidenceBuffer {
    /// Truncate to empty.
    fn clear(&mut self) -> Result<(), BufferError>;

    /// Add `block` followed by a newline, keeping prior content.
    fn append(&mut self, block: &str) -> Result<(), BufferError>;

    /// Discard all prior content and substitute `content`.
    fn replace(&mut self, content: &str) -> Result<(), BufferError>;

    /// Current content.
    fn read_all(&self) -> Result<String, BufferError>;
}

/// In-process buffer. Default for HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct MemoryBuffer {
    content: String,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvidenceBuffer for MemoryBuffer {
    fn clear(&mut self) -> Result<(), BufferError> {
        self.content.clear();
        Ok(())
    }

    fn append(&mut self, block: &str) -> Result<(), BufferError> {
        self.content.push_str(block);
        self.content.push('\n');
        Ok(())
    }

    fn replace(&mut self, content: &str) -> Result<(), BufferError> {
        self.content = content.to_string();
        Ok(())
    }

    fn read_all(&self) -> Result<String, BufferError> {
        Ok(self.content.clone())
    }
}

/// File-backed buffer, visible to other processes reading the same path.
#[derive(Debug)]
pub struct FileBuffer {
    path: PathBuf,
    /// Present for per-run files: deletes the file when the buffer is dropped.
    _guard: Option<TempPath>,
}

impl FileBuffer {
    /// Use a fixed path. The file is created if missing and kept after drop.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, BufferError> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_err(&path, source))?;
        Ok(Self { path, _guard: None })
    }

    /// Create a unique per-run file under `dir`, removed when the buffer is dropped.
    pub fn temporary_in(dir: &Path) -> Result<Self, BufferError> {
        let file = tempfile::Builder::new()
            .prefix("shelfscan-buffer-")
            .suffix(".txt")
            .tempfile_in(dir)
            .map_err(|source| io_err(dir, source))?;
        let guard = file.into_temp_path();
        Ok(Self {
            path: guard.to_path_buf(),
            _guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

impl EvidenceBuffer for FileBuffer {
    fn clear(&mut self) -> Result<(), BufferError> {
        fs::write(&self.path, b"").map_err(|source| io_err(&self.path, source))
    }

    fn append(&mut self, block: &str) -> Result<(), BufferError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| io_err(&self.path, source))?;
        file.write_all(block.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|source| io_err(&self.path, source))
    }

    fn replace(&mut self, content: &str) -> Result<(), BufferError> {
        // Write a sibling file and rename it over the target so readers never see
        // a half-written payload.
        let dir = self.parent_dir().to_path_buf();
        let mut staged = NamedTempFile::new_in(&dir).map_err(|source| io_err(&dir, source))?;
        staged
            .write_all(content.as_bytes())
            .map_err(|source| io_err(staged.path(), source))?;
        staged
            .persist(&self.path)
            .map_err(|e| io_err(&self.path, e.error))?;
        Ok(())
    }

    fn read_all(&self) -> Result<String, BufferError> {
        let bytes = fs::read(&self.path).map_err(|source| io_err(&self.path, source))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> BufferError {
    BufferError::Io {
        path: path.to_path_buf(),
        source,
    }
}
