//! Archive module core types

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::sanitize_member_path;

// ============================================================
// Constants
// ============================================================

/// File extensions treated as comic archives during discovery
pub const ARCHIVE_EXTENSIONS: &[&str] = &["cbz", "cbr", "zip"];

/// 7-Zip executables tried in order
pub const SEVEN_ZIP_COMMANDS: &[&str] = &["7z", "7zz", "7za"];

/// UnRAR executable used for bulk extraction when 7-Zip is missing
pub const UNRAR_COMMAND: &str = "unrar";

// ============================================================
// Error Types
// ============================================================

/// Archive reader error types
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported or corrupt archive: {0}")]
    InvalidArchive(String),

    #[error("Member not found in archive: {0}")]
    MemberNotFound(String),

    #[error("No external archive tool found (tried {0})")]
    ToolNotFound(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

// ============================================================
// Core Data Structures
// ============================================================

/// A file stored inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Relative path with only normal components
    pub path: PathBuf,
    /// Name exactly as stored, used to open the member
    pub name: String,
}

impl ArchiveMember {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: sanitize_member_path(&name),
            name,
        }
    }
}

/// Reads comic archives.
///
/// `open_member` is the primary per-page path; `extract_all` is the bulk
/// fallback used once per archive after a member fails to open.
pub trait ArchiveReader {
    /// List file members (directories excluded)
    fn list_members(&self, archive: &Path) -> Result<Vec<ArchiveMember>>;

    /// Read one member's bytes by its stored name
    fn open_member(&self, archive: &Path, name: &str) -> Result<Vec<u8>>;

    /// Extract every member under `dest`
    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Whether a path has a comic archive extension
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| ARCHIVE_EXTENSIONS.contains(&e.as_str()))
}
