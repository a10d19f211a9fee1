//! Zip archive entries used as fetch sources

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur when reading an archive entry
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive file could not be opened or read
    #[error("Failed to read archive: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid zip archive or the entry is missing
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// One entry extracted from a zip archive
///
/// Only the entry name takes part in cache keys; the contents are what a
/// tabular reader parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    name: String,
    contents: Vec<u8>,
}

impl ArchiveEntry {
    /// Creates an entry from an already extracted name and contents
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }

    /// Reads the entry `entry_name` out of the zip archive at `archive_path`
    ///
    /// # Returns
    /// * `Ok(ArchiveEntry)` holding the decompressed contents
    /// * `Err(ArchiveError)` if the archive cannot be read or has no such entry
    pub fn open(archive_path: &Path, entry_name: &str) -> Result<Self, ArchiveError> {
        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name(entry_name)?;

        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;

        Ok(Self { name, contents })
    }

    /// Name of the entry inside its archive
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decompressed bytes of the entry
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}
