//! Page Record Store
//!
//! Per-archive table of page metadata plus the mutable per-page state
//! written while pages are extracted, edited and saved.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::archive::ArchiveMember;
use crate::combine::{CombineGraph, Direction};
use crate::edit::SelectionError;
use crate::page_spec::{resolve, PageSpec};

/// File extensions recognised as pages
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "bmp", "jpg", "jpeg", "jpe", "jp2", "pbm", "pgm", "ppm", "pxm", "pnm", "png", "tif", "tiff",
    "webp", "gif",
];

/// Check whether an archive member looks like a page image.
///
/// Hidden files (including macOS resource forks such as `._001.jpg`) are
/// never pages.
pub fn is_page_image(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    if hidden {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

// ============================================================
// Edit Bookkeeping
// ============================================================

/// Kinds of page edits, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Resize,
    Rotate,
    Combine,
}

impl EditKind {
    /// Stage name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            EditKind::Resize => "Resize",
            EditKind::Rotate => "Rotate",
            EditKind::Combine => "Combine",
        }
    }

    /// Whether an existing error of kind `prior` blocks this edit
    pub fn is_blocked_by(&self, prior: EditKind) -> bool {
        match self {
            EditKind::Resize => false,
            EditKind::Rotate => prior == EditKind::Resize,
            EditKind::Combine => true,
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an applied edit changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "edit")]
pub enum EditRecord {
    /// Size before and after, as (width, height)
    Resized { from: (u32, u32), to: (u32, u32) },
    /// Counter-clockwise rotation in degrees
    Rotated { degrees: f32 },
    /// Pages absorbed directly by this page, in merge order
    Combined { partners: Vec<(usize, Direction)> },
}

/// Outcome of saving one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Written to a path that did not exist
    NewSave,
    /// Replaced an existing file
    Overwritten,
    /// Skipped because the file exists and overwriting is off
    NotSaved,
    /// The write failed
    Error(String),
}

impl SaveOutcome {
    /// Whether the page image is on disk after this outcome
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::NewSave | SaveOutcome::Overwritten)
    }

    /// Whether this outcome is a failure
    pub fn is_error(&self) -> bool {
        matches!(self, SaveOutcome::Error(_))
    }
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcome::NewSave => write!(f, "saved"),
            SaveOutcome::Overwritten => write!(f, "overwritten"),
            SaveOutcome::NotSaved => write!(f, "not saved, file already exists"),
            SaveOutcome::Error(msg) => write!(f, "{}", msg),
        }
    }
}

// ============================================================
// Page Record
// ============================================================

/// One archived page image and everything that happened to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Sanitised member path inside the archive
    pub source_path: PathBuf,
    /// Member name exactly as stored in the archive
    pub source_name: String,
    /// Errors from each extraction attempt, in attempt order
    pub extract_errors: Vec<String>,
    /// Whether an image was obtained by either extraction method
    pub extracted: bool,
    /// Edit failures by stage
    pub edit_errors: BTreeMap<EditKind, String>,
    /// Applied edits by stage
    pub edit_history: BTreeMap<EditKind, EditRecord>,
    /// Computed output path
    pub save_path: Option<PathBuf>,
    /// Result of the save attempt
    pub save_outcome: Option<SaveOutcome>,
}

impl PageRecord {
    /// Create a record for an archive member
    pub fn new(member: ArchiveMember) -> Self {
        Self {
            source_path: member.path,
            source_name: member.name,
            extract_errors: Vec::new(),
            extracted: false,
            edit_errors: BTreeMap::new(),
            edit_history: BTreeMap::new(),
            save_path: None,
            save_outcome: None,
        }
    }

    /// Member file name without directories
    pub fn file_name(&self) -> &str {
        self.source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source_name)
    }

    /// Member file stem
    pub fn stem(&self) -> &str {
        self.source_path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    /// Member extension including the leading dot, or empty
    pub fn extension(&self) -> String {
        self.source_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default()
    }

    /// Whether an existing error blocks an edit of `kind`
    pub fn is_blocked_for(&self, kind: EditKind) -> bool {
        self.edit_errors.keys().any(|&prior| kind.is_blocked_by(prior))
    }

    /// Record an edit failure; the first error of a kind is kept
    pub fn record_edit_error(&mut self, kind: EditKind, message: impl Into<String>) {
        self.edit_errors.entry(kind).or_insert_with(|| message.into());
    }

    /// Record a successful edit
    pub fn record_edit(&mut self, kind: EditKind, record: EditRecord) {
        let unmerged = match (self.edit_history.get_mut(&kind), record) {
            (
                Some(EditRecord::Combined { partners }),
                EditRecord::Combined {
                    partners: mut more,
                },
            ) => {
                partners.append(&mut more);
                None
            }
            (Some(EditRecord::Rotated { degrees }), EditRecord::Rotated { degrees: more }) => {
                *degrees += more;
                None
            }
            (Some(EditRecord::Resized { to, .. }), EditRecord::Resized { to: new_to, .. }) => {
                *to = new_to;
                None
            }
            (_, record) => Some(record),
        };

        if let Some(record) = unmerged {
            self.edit_history.insert(kind, record);
        }
    }
}

// ============================================================
// Sorting
// ============================================================

/// How page file names are ordered before indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMethod {
    /// Plain string order, digits compared one by one (100 < 99)
    #[default]
    Alpha,
    /// Natural order, digit runs compared as numbers (99 < 100)
    AlphaNumber,
    /// Only the digits of the name, read as one number
    NumbersOnly,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Page sort configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSort {
    #[serde(default)]
    pub method: SortMethod,
    #[serde(default)]
    pub order: SortOrder,
}

impl PageSort {
    pub fn new(method: SortMethod, order: SortOrder) -> Self {
        Self { method, order }
    }

    /// Compare two records by file name, then by full member path
    pub fn compare(&self, a: &PageRecord, b: &PageRecord) -> Ordering {
        let primary = match self.method {
            SortMethod::Alpha => a.file_name().cmp(b.file_name()),
            SortMethod::AlphaNumber => natord::compare(a.file_name(), b.file_name()),
            SortMethod::NumbersOnly => {
                digits_value(a.file_name()).cmp(&digits_value(b.file_name()))
            }
        };
        let ordering = primary.then_with(|| a.source_path.cmp(&b.source_path));

        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// All digits of a name as one number; names without digits sort first
fn digits_value(name: &str) -> Option<u128> {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u128>().unwrap_or(u128::MAX))
}

// ============================================================
// Archive Page Table
// ============================================================

/// All page records of one archive, plus its selection and combine state
#[derive(Debug, Clone)]
pub struct ArchivePages {
    /// Archive on disk
    pub archive_path: PathBuf,
    /// Page records in sorted order; a record's position is its page index
    pub records: Vec<PageRecord>,
    /// Selected page indices, in processing order
    pub selection: Vec<usize>,
    /// Merges performed by the combine stage
    pub combine_graph: CombineGraph,
    /// Edit targets that referenced pages outside the selection
    pub selection_errors: Vec<SelectionError>,
    /// Time spent extracting, editing and saving
    pub elapsed_seconds: f64,
}

impl ArchivePages {
    /// Build the page table from archive members.
    ///
    /// Non-image members are dropped and the rest sorted with `sort`.
    pub fn new(archive_path: impl Into<PathBuf>, members: Vec<ArchiveMember>, sort: PageSort) -> Self {
        let mut records: Vec<PageRecord> = members
            .into_iter()
            .filter(|m| is_page_image(&m.path))
            .map(PageRecord::new)
            .collect();
        records.sort_by(|a, b| sort.compare(a, b));

        Self {
            archive_path: archive_path.into(),
            records,
            selection: Vec::new(),
            combine_graph: CombineGraph::new(),
            selection_errors: Vec::new(),
            elapsed_seconds: 0.0,
        }
    }

    /// Resolve `spec` against this archive and store the selection
    pub fn select(&mut self, spec: &PageSpec) -> &[usize] {
        self.selection = resolve(self.total_pages(), spec);
        &self.selection
    }

    /// Number of pages in the archive
    pub fn total_pages(&self) -> usize {
        self.records.len()
    }

    /// Archive file stem
    pub fn archive_stem(&self) -> &str {
        self.archive_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("archive")
    }

    /// Whether a page index is part of the selection
    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.contains(&index)
    }

    pub fn record(&self, index: usize) -> Option<&PageRecord> {
        self.records.get(index)
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut PageRecord> {
        self.records.get_mut(index)
    }
}
