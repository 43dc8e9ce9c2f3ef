//! Delivering encoded bytes.
//!
//! An [`ExportSink`] receives a suggested filename plus an [`EncodeResult`]
//! and puts the bytes somewhere. Returning `Ok` is the completion signal the
//! [`Session`](crate::session::Session) waits for before it resets.
//!
//! [`FileSink`] writes into a directory atomically: bytes go to a temp file
//! next to the destination, which is then renamed into place, so a failed
//! or interrupted export never leaves a truncated image behind.
//! [`MemorySink`] keeps everything in memory for tests and embedding.

use crate::imaging::{EncodeResult, OutputFormat};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to move export into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReceipt {
    pub filename: String,
    /// Filesystem path, for sinks that write files.
    pub path: Option<PathBuf>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

impl ExportReceipt {
    fn new(filename: String, path: Option<PathBuf>, result: &EncodeResult) -> Self {
        Self {
            filename,
            path,
            format: result.format,
            width: result.width,
            height: result.height,
            bytes: result.byte_size(),
        }
    }
}

pub trait ExportSink {
    fn deliver(
        &mut self,
        filename: &str,
        result: &EncodeResult,
    ) -> Result<ExportReceipt, ExportError>;
}

/// Writes exports into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    prefix: Option<String>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: None,
        }
    }

    /// Prefix every filename with `<prefix>-`, so several inputs exported
    /// into one directory do not overwrite each other.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn final_name(&self, filename: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}-{filename}"),
            None => filename.to_string(),
        }
    }
}

impl ExportSink for FileSink {
    fn deliver(
        &mut self,
        filename: &str,
        result: &EncodeResult,
    ) -> Result<ExportReceipt, ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let name = self.final_name(filename);
        let path = self.dir.join(&name);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&result.bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| ExportError::Persist {
            path: path.clone(),
            source: e.error,
        })?;

        debug!(path = %path.display(), bytes = result.byte_size(), "export written");
        Ok(ExportReceipt::new(name, Some(path), result))
    }
}

/// Collects exports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub delivered: Vec<(String, EncodeResult)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExportSink for MemorySink {
    fn deliver(
        &mut self,
        filename: &str,
        result: &EncodeResult,
    ) -> Result<ExportReceipt, ExportError> {
        self.delivered.push((filename.to_string(), result.clone()));
        Ok(ExportReceipt::new(filename.to_string(), None, result))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Sink whose every delivery fails, to check nothing resets on error.
    pub struct FailingSink;

    impl ExportSink for FailingSink {
        fn deliver(&mut self, _: &str, _: &EncodeResult) -> Result<ExportReceipt, ExportError> {
            Err(ExportError::Io(std::io::Error::other("disk full")))
        }
    }

    fn result(bytes: &[u8]) -> EncodeResult {
        EncodeResult {
            bytes: bytes.to_vec(),
            format: OutputFormat::Png,
            width: 3,
            height: 2,
        }
    }

    #[test]
    fn file_sink_writes_bytes() {
        let tmp = TempDir::new().unwrap();
        let mut sink = FileSink::new(tmp.path());
        let receipt = sink.deliver("converted.png", &result(b"abc")).unwrap();

        let path = tmp.path().join("converted.png");
        assert_eq!(receipt.path.as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        assert_eq!((receipt.width, receipt.height, receipt.bytes), (3, 2, 3));
    }

    #[test]
    fn file_sink_applies_prefix() {
        let tmp = TempDir::new().unwrap();
        let mut sink = FileSink::new(tmp.path()).with_prefix("holiday");
        let receipt = sink.deliver("cropped.png", &result(b"x")).unwrap();
        assert_eq!(receipt.filename, "holiday-cropped.png");
        assert!(tmp.path().join("holiday-cropped.png").exists());
    }

    #[test]
    fn file_sink_creates_dir_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/out");
        let mut sink = FileSink::new(&dir);
        sink.deliver("a.png", &result(b"first")).unwrap();
        sink.deliver("a.png", &result(b"second")).unwrap();
        assert_eq!(std::fs::read(dir.join("a.png")).unwrap(), b"second");
        // Only the final file remains; no temp leftovers
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[test]
    fn memory_sink_records_deliveries() {
        let mut sink = MemorySink::new();
        let receipt = sink.deliver("x.png", &result(b"12")).unwrap();
        assert_eq!(receipt.path, None);
        assert_eq!(sink.delivered.len(), 1);
        assert_eq!(sink.delivered[0].0, "x.png");
        assert_eq!(sink.delivered[0].1.bytes, b"12");
    }
}
