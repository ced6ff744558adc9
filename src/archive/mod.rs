//! Archive Reader module
//!
//! Lists and reads page members of comic archives.
//!
//! # Features
//!
//! - ZIP-backed CBZ/CBR reading via the `zip` crate
//! - RAR-backed CBR reading via an external `7z` / `unrar`
//! - Bulk extraction to a directory for the fallback extraction path
//!
//! # Example
//!
//! ```rust,no_run
//! use comic_page_extract::{ArchiveReader, StandardArchiveReader};
//! use std::path::Path;
//!
//! let reader = StandardArchiveReader::detect();
//! let members = reader.list_members(Path::new("book.cbz")).unwrap();
//! for member in members {
//!     println!("{}", member.name);
//! }
//! ```

mod external;
mod types;
mod zip_reader;

pub use external::{parse_slt_listing, ExternalToolReader};
pub use types::{
    is_archive_path, ArchiveError, ArchiveMember, ArchiveReader, Result, ARCHIVE_EXTENSIONS,
    SEVEN_ZIP_COMMANDS, UNRAR_COMMAND,
};
pub use zip_reader::ZipReader;

use std::path::Path;
use tracing::debug;

/// ZIP reader first, external tools when the archive is not a ZIP
#[derive(Debug, Clone, Default)]
pub struct StandardArchiveReader {
    zip: ZipReader,
    external: ExternalToolReader,
}

impl StandardArchiveReader {
    /// Build a reader, locating external tools on `PATH`
    pub fn detect() -> Self {
        Self {
            zip: ZipReader::new(),
            external: ExternalToolReader::detect(),
        }
    }

    /// Build a reader that only understands ZIP archives
    pub fn zip_only() -> Self {
        Self::default()
    }

    fn with_fallback<T>(
        &self,
        archive: &Path,
        primary: impl FnOnce(&ZipReader) -> Result<T>,
        fallback: impl FnOnce(&ExternalToolReader) -> Result<T>,
    ) -> Result<T> {
        match primary(&self.zip) {
            Err(ArchiveError::InvalidArchive(msg)) if self.external.is_available() => {
                debug!("{} is not a zip ({}), using external tool", archive.display(), msg);
                fallback(&self.external)
            }
            other => other,
        }
    }
}

impl ArchiveReader for StandardArchiveReader {
    fn list_members(&self, archive: &Path) -> Result<Vec<ArchiveMember>> {
        self.with_fallback(
            archive,
            |zip| zip.list_members(archive),
            |ext| ext.list_members(archive),
        )
    }

    fn open_member(&self, archive: &Path, name: &str) -> Result<Vec<u8>> {
        self.with_fallback(
            archive,
            |zip| zip.open_member(archive, name),
            |ext| ext.open_member(archive, name),
        )
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        self.with_fallback(
            archive,
            |zip| zip.extract_all(archive, dest),
            |ext| ext.extract_all(archive, dest),
        )
    }
}
