//! Save planning
//!
//! Computes an output path for every surviving page image and writes it,
//! classifying each page as newly saved, overwritten, left alone because the
//! file exists, or failed.
//!
//! # Name templates
//!
//! File stems are built from literal text and placeholders:
//!
//! | Placeholder | Inserts |
//! |---|---|
//! | `{archive}` | archive file stem |
//! | `{member}` | archived member's file stem |
//! | `{page}` | 1-based page number |
//! | `{counter}` | 1-based running save counter |
//!
//! Without a template the member's stem is used.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{ImageCodec, OutputFormat};
use crate::edit::WorkingImageSet;
use crate::progress::ProgressCallback;
use crate::record::{ArchivePages, SaveOutcome};
use crate::util;

// ============================================================
// Error Types
// ============================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SaveError {
    #[error("Invalid file name template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Failed to create save directory under {0}")]
    Directory(PathBuf),

    #[error("Page index {0} is not in this archive")]
    PageNotFound(usize),
}

pub type Result<T> = std::result::Result<T, SaveError>;

// ============================================================
// Name Template
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSegment {
    Text(String),
    ArchiveStem,
    MemberStem,
    PageNumber,
    Counter,
}

/// Parsed file name template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NameTemplate {
    source: String,
    segments: Vec<NameSegment>,
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: String| SaveError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = template;

        while let Some(open) = rest.find(['{', '}']) {
            text.push_str(&rest[..open]);
            if rest[open..].starts_with('}') {
                return Err(invalid("unmatched '}'".to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| invalid("unclosed '{'".to_string()))?;
            let segment = match &after[..close] {
                "archive" => NameSegment::ArchiveStem,
                "member" => NameSegment::MemberStem,
                "page" => NameSegment::PageNumber,
                "counter" => NameSegment::Counter,
                other => return Err(invalid(format!("unknown placeholder {{{}}}", other))),
            };
            if !text.is_empty() {
                segments.push(NameSegment::Text(std::mem::take(&mut text)));
            }
            segments.push(segment);
            rest = &after[close + 1..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            segments.push(NameSegment::Text(text));
        }

        if segments.is_empty() {
            return Err(invalid("template is empty".to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[NameSegment] {
        &self.segments
    }

    /// Expand the template for one page
    pub fn render(&self, archive_stem: &str, member_stem: &str, page: usize, counter: usize) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                NameSegment::Text(text) => text.clone(),
                NameSegment::ArchiveStem => archive_stem.to_string(),
                NameSegment::MemberStem => member_stem.to_string(),
                NameSegment::PageNumber => page.to_string(),
                NameSegment::Counter => counter.to_string(),
            })
            .collect()
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for NameTemplate {
    type Error = SaveError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NameTemplate> for String {
    fn from(template: NameTemplate) -> String {
        template.source
    }
}

// ============================================================
// Options
// ============================================================

/// Save options
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Candidate save directories, used in rotation
    pub save_dirs: Vec<PathBuf>,
    /// Root for relative save directories and the per-archive default
    pub default_root: PathBuf,
    /// File stem template
    pub name_template: Option<NameTemplate>,
    /// Output format override
    pub format: Option<OutputFormat>,
    /// Replace existing files
    pub overwrite: bool,
    /// Recreate archive-internal sub-directories
    pub keep_archive_paths: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            save_dirs: Vec::new(),
            default_root: PathBuf::from("."),
            name_template: None,
            format: None,
            overwrite: false,
            keep_archive_paths: true,
        }
    }
}

impl SaveOptions {
    /// Create a new options builder
    pub fn builder() -> SaveOptionsBuilder {
        SaveOptionsBuilder::default()
    }
}

/// Builder for [`SaveOptions`]
#[derive(Debug, Default)]
pub struct SaveOptionsBuilder {
    options: SaveOptions,
}

impl SaveOptionsBuilder {
    /// Add a save directory to the rotation
    #[must_use]
    pub fn save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.save_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn default_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.default_root = root.into();
        self
    }

    #[must_use]
    pub fn name_template(mut self, template: NameTemplate) -> Self {
        self.options.name_template = Some(template);
        self
    }

    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.options.format = Some(format);
        self
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn keep_archive_paths(mut self, keep: bool) -> Self {
        self.options.keep_archive_paths = keep;
        self
    }

    /// Build the options
    pub fn build(self) -> SaveOptions {
        self.options
    }
}

// ============================================================
// Planner
// ============================================================

/// Target of one page save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSave {
    pub index: usize,
    pub path: PathBuf,
    pub counter: usize,
}

/// Writes an archive's surviving page images
pub struct SavePlanner<'a> {
    options: &'a SaveOptions,
    codec: &'a dyn ImageCodec,
}

impl<'a> SavePlanner<'a> {
    pub fn new(options: &'a SaveOptions, codec: &'a dyn ImageCodec) -> Self {
        Self { options, codec }
    }

    /// Compute the output path of the `save_number`-th saved page (0-based),
    /// creating its directories.
    pub fn plan(&self, pages: &ArchivePages, index: usize, save_number: usize) -> Result<PlannedSave> {
        let counter = save_number + 1;
        let record = pages
            .record(index)
            .ok_or(SaveError::PageNotFound(index))?;

        let base = self.save_dir(pages.archive_stem(), save_number)?;
        let dir = if self.options.keep_archive_paths {
            let parents: Vec<_> = record
                .source_path
                .parent()
                .map(|p| p.components().collect())
                .unwrap_or_default();
            util::ensure_dirs(&base, &parents).ok_or(SaveError::Directory(base))?
        } else {
            base
        };

        let stem = match &self.options.name_template {
            Some(template) => template.render(pages.archive_stem(), record.stem(), index + 1, counter),
            None => record.stem().to_string(),
        };
        let extension = match self.options.format {
            Some(format) => format.extension().to_string(),
            None => record.extension(),
        };

        Ok(PlannedSave {
            index,
            path: dir.join(format!("{}{}", stem, extension)),
            counter,
        })
    }

    /// Save every selected page that still holds an image.
    ///
    /// Outcomes are recorded on the page records; no failure is returned.
    pub fn save_all(
        &self,
        pages: &mut ArchivePages,
        images: &WorkingImageSet,
        progress: &dyn ProgressCallback,
    ) {
        let targets: Vec<usize> = pages
            .selection
            .iter()
            .copied()
            .filter(|index| images.contains_key(index))
            .collect();
        let total = targets.len();

        for (save_number, &index) in targets.iter().enumerate() {
            progress.on_step_progress(save_number + 1, total);
            let Some(image) = images.get(&index) else {
                continue;
            };

            let (path, outcome) = match self.plan(pages, index, save_number) {
                Ok(planned) => {
                    let outcome = self.write(image, &planned.path);
                    (Some(planned.path), outcome)
                }
                Err(e) => (None, SaveOutcome::Error(e.to_string())),
            };

            match &outcome {
                SaveOutcome::Error(msg) => warn!("Page {}: {}", index + 1, msg),
                SaveOutcome::NotSaved => info!("Page {}: {}", index + 1, outcome),
                _ => debug!("Page {}: {}", index + 1, outcome),
            }

            if let Some(record) = pages.record_mut(index) {
                record.save_path = path;
                record.save_outcome = Some(outcome);
            }
        }
    }

    /// Write one image under the overwrite policy
    pub fn write(&self, image: &DynamicImage, path: &Path) -> SaveOutcome {
        let existed = path.exists();
        if existed {
            if !self.options.overwrite {
                return SaveOutcome::NotSaved;
            }
            if let Err(e) = std::fs::remove_file(path) {
                return SaveOutcome::Error(format!("Failed to replace {}: {}", path.display(), e));
            }
        }

        match self.codec.save(image, path) {
            Ok(()) if existed => SaveOutcome::Overwritten,
            Ok(()) => SaveOutcome::NewSave,
            Err(e) => SaveOutcome::Error(format!("Failed to save page: {}", e)),
        }
    }

    /// Directory for the `save_number`-th save, rotating through the candidates
    fn save_dir(&self, archive_stem: &str, save_number: usize) -> Result<PathBuf> {
        let root = &self.options.default_root;
        if self.options.save_dirs.is_empty() {
            return util::ensure_dirs(root, &[archive_stem]).ok_or_else(|| SaveError::Directory(root.clone()));
        }

        let dir = &self.options.save_dirs[save_number % self.options.save_dirs.len()];
        if dir.is_absolute() {
            std::fs::create_dir_all(dir).map_err(|_| SaveError::Directory(dir.clone()))?;
            Ok(dir.clone())
        } else {
            let segments: Vec<_> = dir.components().collect();
            util::ensure_dirs(root, &segments).ok_or_else(|| SaveError::Directory(root.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveMember;
    use crate::codec::ImageCrateCodec;
    use crate::page_spec::PageSpec;
    use crate::progress::SilentProgress;
    use crate::record::PageSort;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 40) as u8, (y * 40) as u8, 7])
        }))
    }

    fn archive(names: &[&str], spec: PageSpec) -> ArchivePages {
        let members = names.iter().map(|n| ArchiveMember::new(*n)).collect();
        let mut pages = ArchivePages::new("/comics/Issue 01.cbz", members, PageSort::default());
        pages.select(&spec);
        pages
    }

    #[test]
    fn test_template_parse() {
        let template = NameTemplate::parse("{archive}-Page-{page}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                NameSegment::ArchiveStem,
                NameSegment::Text("-Page-".into()),
                NameSegment::PageNumber
            ]
        );
        assert_eq!(template.render("Issue 01", "p001", 3, 1), "Issue 01-Page-3");
        assert_eq!(template.to_string(), "{archive}-Page-{page}");
    }

    #[test]
    fn test_template_all_placeholders() {
        let template = NameTemplate::parse("{counter}_{member}").unwrap();
        assert_eq!(template.render("a", "p007", 7, 2), "2_p007");
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            NameTemplate::parse("{title}"),
            Err(SaveError::InvalidTemplate { .. })
        ));
        assert!(NameTemplate::parse("page{").is_err());
        assert!(NameTemplate::parse("page}").is_err());
        assert!(NameTemplate::parse("").is_err());
    }

    #[test]
    fn test_template_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            name: NameTemplate,
        }
        let parsed: Wrapper = toml::from_str(r#"name = "cover-{archive}""#).unwrap();
        assert_eq!(parsed.name.render("x", "y", 1, 1), "cover-x");
        assert!(toml::from_str::<Wrapper>(r#"name = "{bad}""#).is_err());
    }

    #[test]
    fn test_default_dir_and_member_name() {
        let root = tempdir().unwrap();
        let options = SaveOptions::builder().default_root(root.path()).build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let pages = archive(&["inner/p1.png", "inner/p2.png"], PageSpec::All);

        let planned = planner.plan(&pages, 1, 0).unwrap();
        assert_eq!(
            planned.path,
            root.path().join("Issue 01").join("inner").join("p2.png")
        );
        assert_eq!(planned.counter, 1);
        assert!(root.path().join("Issue 01/inner").is_dir());
    }

    #[test]
    fn test_flat_paths_and_format_override() {
        let root = tempdir().unwrap();
        let options = SaveOptions::builder()
            .default_root(root.path())
            .save_dir("thumbs")
            .keep_archive_paths(false)
            .format(OutputFormat::Jpeg)
            .name_template(NameTemplate::parse("{archive}-{counter}").unwrap())
            .build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let pages = archive(&["deep/dir/p1.png"], PageSpec::All);

        let planned = planner.plan(&pages, 0, 4).unwrap();
        assert_eq!(planned.path, root.path().join("thumbs").join("Issue 01-5.jpg"));
    }

    #[test]
    fn test_directory_rotation() {
        let root = tempdir().unwrap();
        let absolute = root.path().join("abs/out");
        let options = SaveOptions::builder()
            .default_root(root.path())
            .save_dir("a")
            .save_dir(&absolute)
            .keep_archive_paths(false)
            .build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let pages = archive(&["1.png", "2.png", "3.png"], PageSpec::All);

        let dirs: Vec<PathBuf> = (0..3)
            .map(|n| planner.plan(&pages, n, n).unwrap().path.parent().unwrap().to_path_buf())
            .collect();
        assert_eq!(dirs, vec![root.path().join("a"), absolute.clone(), root.path().join("a")]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let root = tempdir().unwrap();
        let options = SaveOptions::builder()
            .default_root(root.path().join("missing"))
            .build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let pages = archive(&["1.png"], PageSpec::All);
        assert!(matches!(planner.plan(&pages, 0, 0), Err(SaveError::Directory(_))));
    }

    #[test]
    fn test_existing_file_not_saved_without_overwrite() {
        let root = tempdir().unwrap();
        let options = SaveOptions::builder()
            .default_root(root.path())
            .keep_archive_paths(false)
            .build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);

        let names: Vec<String> = (1..=10).map(|n| format!("{:02}.png", n)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut pages = archive(&refs, PageSpec::list(&[1, 4, 5, -1]));

        let existing = root.path().join("Issue 01").join("01.png");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"keep me").unwrap();

        let mut images = WorkingImageSet::new();
        for index in [0, 3, 9] {
            images.insert(index, solid(4, 4));
        }
        planner.save_all(&mut pages, &images, &SilentProgress);

        assert_eq!(pages.records[0].save_outcome, Some(SaveOutcome::NotSaved));
        assert_eq!(std::fs::read(&existing).unwrap(), b"keep me");
        assert_eq!(pages.records[3].save_outcome, Some(SaveOutcome::NewSave));
        assert_eq!(pages.records[9].save_outcome, Some(SaveOutcome::NewSave));
        // Absorbed page 5 has no image and no outcome
        assert_eq!(pages.records[4].save_outcome, None);
    }

    #[test]
    fn test_overwrite_replaces_file() {
        let root = tempdir().unwrap();
        let options = SaveOptions::builder()
            .default_root(root.path())
            .overwrite(true)
            .build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let path = root.path().join("page.png");
        std::fs::write(&path, b"old").unwrap();

        assert_eq!(planner.write(&solid(3, 3), &path), SaveOutcome::Overwritten);
        assert_eq!(codec.decode_path(&path).unwrap().to_rgb8(), solid(3, 3).to_rgb8());
    }

    #[test]
    fn test_codec_failure_is_error_outcome() {
        let root = tempdir().unwrap();
        let options = SaveOptions::default();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let outcome = planner.write(&solid(2, 2), &root.path().join("page.unknownext"));
        assert!(outcome.is_error());
        assert!(!outcome.is_saved());
    }

    #[test]
    fn test_identity_round_trip() {
        let root = tempdir().unwrap();
        let options = SaveOptions::builder()
            .default_root(root.path())
            .build();
        let codec = ImageCrateCodec::new();
        let planner = SavePlanner::new(&options, &codec);
        let mut pages = archive(&["p1.png"], PageSpec::All);

        let original = solid(6, 5);
        let mut images = WorkingImageSet::new();
        images.insert(0, original.clone());
        planner.save_all(&mut pages, &images, &SilentProgress);

        let saved = pages.records[0].save_path.clone().unwrap();
        assert_eq!(codec.decode_path(&saved).unwrap().to_rgb8(), original.to_rgb8());
    }
}
