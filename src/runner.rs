//! Run driver
//!
//! [`RunContext`] owns the resolved configuration and collaborators for one
//! run. Archives are discovered up front, then processed one at a time:
//! list → sort → select → extract → edit → save. Decoded images and the
//! temporary extraction directory are released before the next archive
//! starts.

use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::{is_archive_path, ArchiveError, ArchiveReader, StandardArchiveReader};
use crate::codec::{ImageCodec, ImageCrateCodec};
use crate::config::RunConfig;
use crate::edit::EditPipeline;
use crate::extract::PageExtractor;
use crate::progress::{ProcessingStage, ProgressCallback, RunSummary};
use crate::record::{ArchivePages, PageSort};
use crate::report::{ArchiveReport, ReportError, RunReport};
use crate::save::SavePlanner;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Input path does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Selection computed for one archive without extracting anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePlan {
    pub path: PathBuf,
    pub total_pages: usize,
    pub selection: Vec<usize>,
    /// Set when the archive could not be listed
    pub error: Option<String>,
}

/// State of one run over any number of archives
pub struct RunContext {
    config: RunConfig,
    reader: Box<dyn ArchiveReader>,
    codec: Box<dyn ImageCodec>,
    archives: Vec<PathBuf>,
    report: RunReport,
}

impl RunContext {
    /// Create a context with the zip reader, external tool fallback and
    /// `image` codec
    pub fn new(config: RunConfig) -> Self {
        Self::with_components(
            config,
            Box::new(StandardArchiveReader::detect()),
            Box::new(ImageCrateCodec::new()),
        )
    }

    pub fn with_components(
        config: RunConfig,
        reader: Box<dyn ArchiveReader>,
        codec: Box<dyn ImageCodec>,
    ) -> Self {
        let report = RunReport::new(config.description.clone());
        Self {
            config,
            reader,
            codec,
            archives: Vec::new(),
            report,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Archives queued for processing, in discovery order
    pub fn archives(&self) -> &[PathBuf] {
        &self.archives
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Queue an archive, or every archive in a directory.
    ///
    /// Directories are searched recursively only when the configuration
    /// asks for sub-directories. Returns how many archives were added.
    pub fn add_path(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(RunError::InputNotFound(path.to_path_buf()));
        }

        let found = if path.is_dir() {
            self.discover(path)
        } else if is_archive_path(path) {
            vec![path.to_path_buf()]
        } else {
            debug!("Not an archive: {}", path.display());
            Vec::new()
        };

        let mut added = 0;
        for archive in found {
            if self.add_archive(archive) {
                added += 1;
            }
        }
        Ok(added)
    }

    fn discover(&self, dir: &Path) -> Vec<PathBuf> {
        let max_depth = if self.config.search_sub_dirs { usize::MAX } else { 1 };
        let mut found: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_archive_path(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        found
    }

    fn add_archive(&mut self, archive: PathBuf) -> bool {
        let key = canonical(&archive);
        if self.archives.iter().any(|queued| canonical(queued) == key) {
            warn!("{} has already been added", archive.display());
            return false;
        }
        info!("Archive found: {}", archive.display());
        self.archives.push(archive);
        true
    }

    /// List every queued archive and resolve its selection
    pub fn plan(&self) -> Vec<ArchivePlan> {
        self.archives
            .iter()
            .map(|path| match self.load_pages(path) {
                Ok(pages) => ArchivePlan {
                    path: path.clone(),
                    total_pages: pages.total_pages(),
                    selection: pages.selection,
                    error: None,
                },
                Err(e) => ArchivePlan {
                    path: path.clone(),
                    total_pages: 0,
                    selection: Vec::new(),
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }

    /// Read an archive's page table and apply the configured selection
    fn load_pages(&self, path: &Path) -> Result<ArchivePages> {
        let members = self
            .reader
            .list_members(path)
            .map_err(|source| RunError::Archive {
                path: path.to_path_buf(),
                source,
            })?;
        let mut pages = ArchivePages::new(path, members, self.config.sort);
        pages.select(&self.config.pages);
        Ok(pages)
    }

    /// Extract, edit and save the selected pages of one archive.
    ///
    /// Page-level failures are recorded in the returned table; only a
    /// failure to read the archive itself is an `Err`.
    pub fn process_archive(
        &self,
        path: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<ArchivePages> {
        let started = Instant::now();

        progress.on_step_start(&ProcessingStage::Listing.to_string());
        let mut pages = self.load_pages(path)?;
        progress.on_step_complete(
            ProcessingStage::Listing.name(),
            &format!(
                "{} of {} pages selected",
                pages.selection.len(),
                pages.total_pages()
            ),
        );

        progress.on_step_start(&ProcessingStage::Extracting.to_string());
        let mut extractor = PageExtractor::new(self.reader.as_ref(), self.codec.as_ref(), path)
            .with_temp_root(self.config.temp_root.clone());
        let mut images = extractor.extract_selected(&mut pages, progress);
        extractor.finish();
        progress.on_step_complete(
            ProcessingStage::Extracting.name(),
            &format!("{} pages", images.len()),
        );

        EditPipeline::new(&self.config.edit, self.codec.as_ref()).run_with_progress(
            &mut pages,
            &mut images,
            progress,
        );

        progress.on_step_start(&ProcessingStage::Saving.to_string());
        SavePlanner::new(&self.config.save, self.codec.as_ref()).save_all(
            &mut pages,
            &images,
            progress,
        );
        let saved = pages
            .records
            .iter()
            .filter(|r| r.save_outcome.as_ref().is_some_and(|o| o.is_saved()))
            .count();
        progress.on_step_complete(ProcessingStage::Saving.name(), &format!("{} saved", saved));

        pages.elapsed_seconds = started.elapsed().as_secs_f64();
        progress.on_step_complete(
            ProcessingStage::Completed.name(),
            &format!("{:.2}s", pages.elapsed_seconds),
        );
        Ok(pages)
    }

    /// Process every queued archive and collect the report
    pub fn run(&mut self, progress: &dyn ProgressCallback) -> RunSummary {
        let total = self.archives.len();

        for (number, path) in self.archives.iter().enumerate() {
            progress.on_debug(&format!("[{}/{}] {}", number + 1, total, path.display()));
            let archive_report = match self.process_archive(path, progress) {
                Ok(pages) => ArchiveReport::from_pages(&pages),
                Err(e) => {
                    warn!("{}", e);
                    ArchiveReport::failed(path, e)
                }
            };
            self.report.push(archive_report);
        }

        self.report.summary()
    }

    /// Write the text log (when worthwhile) and the JSON report.
    ///
    /// Returns the text log's path if one was written.
    pub fn write_reports(&self) -> Result<Option<PathBuf>> {
        if let Some(json_path) = &self.config.json_report {
            self.report.write_json(json_path)?;
        }

        let Some(log_path) = &self.config.log_path else {
            debug!("Log file creation turned off");
            return Ok(None);
        };
        if !self.report.should_write() {
            debug!("Nothing saved and no edit failed, no log written");
            return Ok(None);
        }

        self.report.write_text(log_path)?;
        Ok(Some(log_path.clone()))
    }
}

/// Read an archive's pages in sorted order
pub fn inspect(reader: &dyn ArchiveReader, path: &Path, sort: PageSort) -> Result<ArchivePages> {
    let members = reader
        .list_members(path)
        .map_err(|source| RunError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(ArchivePages::new(path, members, sort))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliOverrides, Preset};
    use crate::page_spec::PageSpec;
    use crate::progress::SilentProgress;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_cbz(path: &Path, pages: usize) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for n in 1..=pages {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 20, Rgb([n as u8, 0, 0])));
            let mut bytes = Vec::new();
            img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
                .unwrap();
            zip.start_file(format!("pages/{:02}.png", n), FileOptions::default())
                .unwrap();
            zip.write_all(&bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn config(root: &Path, preset: Preset) -> RunConfig {
        let overrides = CliOverrides {
            default_root: Some(root.to_path_buf()),
            ..CliOverrides::new()
        };
        preset.merge_with_cli("test", &overrides)
    }

    fn context(root: &Path, preset: Preset) -> RunContext {
        RunContext::with_components(
            config(root, preset),
            Box::new(StandardArchiveReader::zip_only()),
            Box::new(ImageCrateCodec::new()),
        )
    }

    #[test]
    fn test_add_path_and_duplicates() {
        let tmp = TempDir::new().unwrap();
        write_cbz(&tmp.path().join("a.cbz"), 1);
        write_cbz(&tmp.path().join("b.cbz"), 1);
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let mut ctx = context(tmp.path(), Preset::default());
        assert_eq!(ctx.add_path(tmp.path()).unwrap(), 2);
        assert_eq!(ctx.add_path(&tmp.path().join("a.cbz")).unwrap(), 0);
        assert_eq!(ctx.archives().len(), 2);
        assert!(matches!(
            ctx.add_path(&tmp.path().join("missing.cbz")),
            Err(RunError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_sub_directories_only_when_enabled() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        write_cbz(&tmp.path().join("nested/deep.cbz"), 1);

        let mut flat = context(tmp.path(), Preset::default());
        assert_eq!(flat.add_path(tmp.path()).unwrap(), 0);

        let recursive = Preset {
            search_sub_dirs: true,
            ..Preset::default()
        };
        let mut ctx = context(tmp.path(), recursive);
        assert_eq!(ctx.add_path(tmp.path()).unwrap(), 1);
    }

    #[test]
    fn test_plan() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("book.cbz");
        write_cbz(&archive, 5);

        let preset = Preset {
            pages: PageSpec::list(&[1, -1]),
            ..Preset::default()
        };
        let mut ctx = context(tmp.path(), preset);
        ctx.add_path(&archive).unwrap();
        let plan = ctx.plan();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].total_pages, 5);
        assert_eq!(plan[0].selection, vec![0, 4]);
        assert!(plan[0].error.is_none());
    }

    #[test]
    fn test_run_saves_and_logs() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("book.cbz");
        write_cbz(&archive, 3);

        let mut ctx = context(tmp.path(), Preset::default());
        ctx.add_path(&archive).unwrap();
        let summary = ctx.run(&SilentProgress);

        assert_eq!(summary.archives, 1);
        assert_eq!(summary.pages_extracted, 3);
        assert_eq!(summary.pages_saved, 3);
        assert!(tmp.path().join("book/pages/02.png").is_file());

        let log = ctx.write_reports().unwrap().unwrap();
        let text = std::fs::read_to_string(log).unwrap();
        assert!(text.contains("- Total Pages Saved: 3"));
    }

    #[test]
    fn test_corrupt_archive_is_reported() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("broken.cbz");
        std::fs::write(&archive, b"not a zip").unwrap();

        let mut ctx = context(tmp.path(), Preset::default());
        ctx.add_path(&archive).unwrap();
        let summary = ctx.run(&SilentProgress);

        assert_eq!(summary.pages_extracted, 0);
        assert_eq!(ctx.report().failed_archives(), 1);
        // Nothing saved, no edit failed
        assert_eq!(ctx.write_reports().unwrap(), None);
    }

    #[test]
    fn test_inspect_sorted() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("book.cbz");
        write_cbz(&archive, 3);

        let reader = StandardArchiveReader::zip_only();
        let pages = inspect(&reader, &archive, PageSort::default()).unwrap();
        let names: Vec<&str> = pages.records.iter().map(|r| r.source_name.as_str()).collect();
        assert_eq!(names, vec!["pages/01.png", "pages/02.png", "pages/03.png"]);
    }
}
