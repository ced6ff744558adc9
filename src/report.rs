//! Run report
//!
//! Collects the outcome of every processed archive and renders it as the
//! plain-text log file, or as JSON.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::combine::CombineNode;
use crate::progress::RunSummary;
use crate::record::{ArchivePages, EditRecord, SaveOutcome};
use crate::util;

/// Default log file name
pub const DEFAULT_LOG_NAME: &str = "comic-page-extract__log.txt";

const ARROW_WIDTH: usize = 7;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Outcome of one selected page
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// 1-based page number
    pub page: usize,
    /// Page number, or merged numbers such as `4-5`
    pub label: String,
    pub source: String,
    pub extracted: bool,
    pub extract_errors: Vec<String>,
    /// Survivor page number when this page was merged into another
    pub combined_into: Option<usize>,
    /// Absorption tree when this page holds merged pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combine_tree: Option<CombineNode>,
    pub edits: Vec<String>,
    pub edit_errors: Vec<String>,
    pub save_path: Option<PathBuf>,
    pub save_outcome: Option<SaveOutcome>,
}

/// Outcome of one archive
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub archive_path: PathBuf,
    pub elapsed_seconds: f64,
    /// Why the archive could not be processed at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub selection_errors: Vec<String>,
    pub pages: Vec<PageReport>,
}

impl ArchiveReport {
    /// Snapshot the selected pages of a processed archive
    pub fn from_pages(pages: &ArchivePages) -> Self {
        let graph = &pages.combine_graph;
        let page_reports = pages
            .selection
            .iter()
            .filter_map(|&index| {
                let record = pages.record(index)?;
                let combined_into = graph
                    .is_absorbed(index)
                    .then(|| graph.resolve_survivor(index) + 1);

                let edits = record
                    .edit_history
                    .values()
                    .map(|edit| match edit {
                        EditRecord::Resized { from, to } => {
                            format!("Resized from {}x{} to {}x{}", from.0, from.1, to.0, to.1)
                        }
                        EditRecord::Rotated { degrees } => format!("Rotated {} degrees", degrees),
                        EditRecord::Combined { .. } => graph.describe(index),
                    })
                    .collect();

                Some(PageReport {
                    page: index + 1,
                    label: graph.label(index),
                    source: record.source_name.clone(),
                    extracted: record.extracted,
                    extract_errors: record.extract_errors.clone(),
                    combined_into,
                    combine_tree: graph.node(index).cloned(),
                    edits,
                    edit_errors: record.edit_errors.values().cloned().collect(),
                    save_path: record.save_path.clone(),
                    save_outcome: record.save_outcome.clone(),
                })
            })
            .collect();

        Self {
            archive_path: pages.archive_path.clone(),
            elapsed_seconds: pages.elapsed_seconds,
            error: None,
            selection_errors: pages.selection_errors.iter().map(ToString::to_string).collect(),
            pages: page_reports,
        }
    }

    /// An archive that failed before any page was processed
    pub fn failed(archive_path: &Path, error: impl ToString) -> Self {
        Self {
            archive_path: archive_path.to_path_buf(),
            elapsed_seconds: 0.0,
            error: Some(error.to_string()),
            selection_errors: Vec::new(),
            pages: Vec::new(),
        }
    }
}

/// Report of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Local>,
    pub description: Option<String>,
    pub archives: Vec<ArchiveReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RunReport {
    pub fn new(description: Option<String>) -> Self {
        Self {
            generated_at: Local::now(),
            description,
            archives: Vec::new(),
        }
    }

    pub fn push(&mut self, archive: ArchiveReport) {
        self.archives.push(archive);
    }

    /// Totals over all archives
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            archives: self.archives.len(),
            ..RunSummary::default()
        };

        for page in self.archives.iter().flat_map(|a| &a.pages) {
            if page.extracted {
                summary.pages_extracted += 1;
            }
            if !page.edit_errors.is_empty() {
                summary.edit_errors += 1;
            }
            match &page.save_outcome {
                Some(SaveOutcome::NewSave | SaveOutcome::Overwritten) => summary.pages_saved += 1,
                Some(SaveOutcome::NotSaved) => summary.pages_skipped += 1,
                Some(SaveOutcome::Error(_)) => summary.save_errors += 1,
                None => {}
            }
        }

        summary
    }

    /// A log is only worth writing when a save was attempted or an edit failed
    pub fn should_write(&self) -> bool {
        let summary = self.summary();
        summary.pages_saved + summary.save_errors + summary.edit_errors > 0
    }

    /// Archives that could not be processed
    pub fn failed_archives(&self) -> usize {
        self.archives.iter().filter(|a| a.error.is_some()).count()
    }

    /// Render the text log
    pub fn render_text(&self) -> String {
        let summary = self.summary();
        let mut out = String::new();

        let banner = "=".repeat(33);
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(out, "=  Comic Page Extract Log File  =");
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(out, "- Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "- Total Pages Extracted: {}", summary.pages_extracted);
        let _ = writeln!(out, "- Total Pages Saved: {}", summary.pages_saved);
        if summary.pages_skipped > 0 {
            let _ = writeln!(out, "- Total Pages Skipped, File Exists: {}", summary.pages_skipped);
        }
        if summary.save_errors > 0 {
            let _ = writeln!(out, "- Total Pages Not Saved Due To Errors: {}", summary.save_errors);
        }
        if summary.edit_errors > 0 {
            let _ = writeln!(out, "- Total Pages That Failed Editing*: {}", summary.edit_errors);
            let _ = writeln!(
                out,
                "*A page that fails an edit keeps its earlier edits and can still be saved."
            );
        }

        if let Some(description) = &self.description {
            let _ = writeln!(out, "\nPreset description:");
            let _ = writeln!(out, "  {}", description);
        }

        for archive in &self.archives {
            let _ = writeln!(out, "\nArchive");
            let _ = writeln!(
                out,
                "  {} ({})",
                archive.archive_path.display(),
                util::format_elapsed(archive.elapsed_seconds)
            );
            if let Some(error) = &archive.error {
                let _ = writeln!(out, "  Failed: {}", error);
            }
            for error in &archive.selection_errors {
                let _ = writeln!(out, "  {}", error);
            }
            for page in &archive.pages {
                render_page(&mut out, page, &archive.pages);
            }
        }

        out
    }

    /// Write the text log to `path`
    pub fn write_text(&self, path: &Path) -> Result<()> {
        write_file(path, &self.render_text())?;
        info!("Log written to {}", path.display());
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to `path`
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_file(path, &self.to_json()?)
    }
}

/// One page line plus its edit lines.
///
/// An absorbed page gets only its `combined into` line; its edits are
/// listed under the survivor it was merged into.
fn render_page(out: &mut String, page: &PageReport, pages: &[PageReport]) {
    let detail_indent = " ".repeat(19);

    if let Some(survivor) = page.combined_into {
        let label = page.page.to_string();
        let _ = writeln!(
            out,
            "    Page {} {}combined into page {}",
            label,
            arrow(&label),
            survivor
        );
        return;
    }

    if !page.extracted {
        let label = page.page.to_string();
        let _ = writeln!(
            out,
            "    Page {} {}Extraction failed: {}",
            label,
            arrow(&label),
            page.extract_errors.join("; ")
        );
        return;
    }

    let target = match (&page.save_path, &page.save_outcome) {
        (_, Some(SaveOutcome::Error(msg))) => msg.clone(),
        (Some(path), Some(SaveOutcome::NotSaved)) => {
            format!("{} (not saved, file already exists)", path.display())
        }
        (Some(path), _) => path.display().to_string(),
        (None, _) => "not saved".to_string(),
    };
    let _ = writeln!(out, "    Page {} {}{}", page.label, arrow(&page.label), target);

    for line in page.edits.iter().chain(&page.edit_errors) {
        let _ = writeln!(out, "{}{}", detail_indent, line);
    }
    for absorbed in pages.iter().filter(|p| p.combined_into == Some(page.page)) {
        for line in absorbed.edits.iter().chain(&absorbed.edit_errors) {
            let _ = writeln!(out, "{}Page {}: {}", detail_indent, absorbed.page, line);
        }
    }
}

/// `------> ` shortened so page labels of different widths line up
fn arrow(label: &str) -> String {
    format!("{}> ", "-".repeat(ARROW_WIDTH.saturating_sub(label.len()).max(1)))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}
