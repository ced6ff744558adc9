//! Page extraction
//!
//! Each selected page is first read straight from the archive by member
//! name and decoded. If that fails, the whole archive is extracted once to a
//! temporary directory and the page is decoded from there; the directory is
//! reused for the archive's remaining pages and removed on [`PageExtractor::finish`].

use image::DynamicImage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

use crate::archive::ArchiveReader;
use crate::codec::ImageCodec;
use crate::edit::WorkingImageSet;
use crate::progress::ProgressCallback;
use crate::record::{ArchivePages, PageRecord};

/// Prefix for temporary extraction directories
pub const TEMP_DIR_PREFIX: &str = "comic-page-extract-";

/// Both extraction methods failed for one page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to extract {member}: {primary}; fallback: {fallback}")]
pub struct ExtractError {
    pub member: String,
    pub primary: String,
    pub fallback: String,
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// A decoded page and, when the fallback was needed, why the primary failed
#[derive(Debug)]
pub struct Extraction {
    pub image: DynamicImage,
    pub primary_error: Option<String>,
}

/// Extracts and decodes pages of one archive
pub struct PageExtractor<'a> {
    reader: &'a dyn ArchiveReader,
    codec: &'a dyn ImageCodec,
    archive: PathBuf,
    temp_root: Option<PathBuf>,
    /// Bulk extraction result, attempted at most once per archive
    fallback_dir: Option<std::result::Result<TempDir, String>>,
}

impl<'a> PageExtractor<'a> {
    pub fn new(reader: &'a dyn ArchiveReader, codec: &'a dyn ImageCodec, archive: &Path) -> Self {
        Self {
            reader,
            codec,
            archive: archive.to_path_buf(),
            temp_root: None,
            fallback_dir: None,
        }
    }

    /// Create fallback directories under `root` instead of the system temp dir
    #[must_use]
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    /// Extract one page, falling back to bulk extraction on failure
    pub fn try_extract(&mut self, record: &PageRecord) -> Result<Extraction> {
        let primary_error = match self.primary(record) {
            Ok(image) => {
                return Ok(Extraction {
                    image,
                    primary_error: None,
                })
            }
            Err(e) => e,
        };
        debug!(
            "Direct read of {} failed ({}), trying bulk extraction",
            record.source_name, primary_error
        );

        match self.fallback(record) {
            Ok(image) => Ok(Extraction {
                image,
                primary_error: Some(primary_error),
            }),
            Err(fallback) => Err(ExtractError {
                member: record.source_name.clone(),
                primary: primary_error,
                fallback,
            }),
        }
    }

    /// Extract and decode the selected pages of `pages`.
    ///
    /// Outcomes are written into each page record; pages that fail both
    /// methods are left out of the returned set.
    pub fn extract_selected(
        &mut self,
        pages: &mut ArchivePages,
        progress: &dyn ProgressCallback,
    ) -> WorkingImageSet {
        let mut images = WorkingImageSet::new();
        let selection = pages.selection.clone();
        let total = selection.len();

        for (done, &index) in selection.iter().enumerate() {
            progress.on_step_progress(done + 1, total);
            let Some(record) = pages.record(index) else {
                continue;
            };

            let outcome = self.try_extract(record);
            let Some(record) = pages.record_mut(index) else {
                continue;
            };
            match outcome {
                Ok(extraction) => {
                    record.extracted = true;
                    record.extract_errors.extend(extraction.primary_error);
                    images.insert(index, extraction.image);
                }
                Err(e) => {
                    warn!("Page {}: {}", index + 1, e);
                    record.extracted = false;
                    record.extract_errors.push(e.primary);
                    record.extract_errors.push(e.fallback);
                }
            }
        }

        images
    }

    /// Remove the fallback directory, if one was created
    pub fn finish(self) {
        if let Some(Ok(dir)) = self.fallback_dir {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    fn primary(&self, record: &PageRecord) -> std::result::Result<DynamicImage, String> {
        let bytes = self
            .reader
            .open_member(&self.archive, &record.source_name)
            .map_err(|e| e.to_string())?;
        self.codec.decode(&bytes).map_err(|e| e.to_string())
    }

    fn fallback(&mut self, record: &PageRecord) -> std::result::Result<DynamicImage, String> {
        let dir = self.fallback_dir()?;
        let path = dir.join(&record.source_path);
        self.codec.decode_path(&path).map_err(|e| e.to_string())
    }

    /// Extract the archive once; later calls reuse the result
    fn fallback_dir(&mut self) -> std::result::Result<PathBuf, String> {
        if self.fallback_dir.is_none() {
            let created = self.create_fallback_dir();
            self.fallback_dir = Some(created);
        }

        match &self.fallback_dir {
            Some(Ok(dir)) => Ok(dir.path().to_path_buf()),
            Some(Err(e)) => Err(e.clone()),
            None => Err("fallback extraction was not attempted".to_string()),
        }
    }

    fn create_fallback_dir(&self) -> std::result::Result<TempDir, String> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| format!("Failed to create temporary directory: {}", e))?;

        debug!(
            "Extracting {} to {}",
            self.archive.display(),
            dir.path().display()
        );
        self.reader
            .extract_all(&self.archive, dir.path())
            .map_err(|e| e.to_string())?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveError, ArchiveMember};
    use crate::codec::ImageCrateCodec;
    use crate::page_spec::PageSpec;
    use crate::progress::SilentProgress;
    use crate::record::PageSort;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::cell::Cell;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([9, 9, 9])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Reader whose direct reads always fail; bulk extraction writes PNGs
    struct BulkOnlyReader {
        names: Vec<&'static str>,
        extract_calls: Cell<usize>,
        extract_fails: bool,
    }

    impl ArchiveReader for BulkOnlyReader {
        fn list_members(&self, _archive: &Path) -> crate::archive::Result<Vec<ArchiveMember>> {
            Ok(self.names.iter().map(|n| ArchiveMember::new(*n)).collect())
        }

        fn open_member(&self, _archive: &Path, name: &str) -> crate::archive::Result<Vec<u8>> {
            Err(ArchiveError::MemberNotFound(name.to_string()))
        }

        fn extract_all(&self, _archive: &Path, dest: &Path) -> crate::archive::Result<()> {
            self.extract_calls.set(self.extract_calls.get() + 1);
            if self.extract_fails {
                return Err(ArchiveError::ToolNotFound("7z".into()));
            }
            for name in &self.names {
                let path = dest.join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, png_bytes(4, 6))?;
            }
            Ok(())
        }
    }

    /// Reader that serves PNG bytes directly
    struct DirectReader;

    impl ArchiveReader for DirectReader {
        fn list_members(&self, _archive: &Path) -> crate::archive::Result<Vec<ArchiveMember>> {
            Ok(vec![ArchiveMember::new("01.png"), ArchiveMember::new("02.png")])
        }

        fn open_member(&self, _archive: &Path, name: &str) -> crate::archive::Result<Vec<u8>> {
            match name {
                "01.png" => Ok(png_bytes(3, 5)),
                _ => Ok(b"corrupt".to_vec()),
            }
        }

        fn extract_all(&self, _archive: &Path, _dest: &Path) -> crate::archive::Result<()> {
            Err(ArchiveError::ToolNotFound("7z".into()))
        }
    }

    fn pages_for(reader: &dyn ArchiveReader) -> ArchivePages {
        let archive = Path::new("/comics/book.cbr");
        let members = reader.list_members(archive).unwrap();
        let mut pages = ArchivePages::new(archive, members, PageSort::default());
        pages.select(&PageSpec::All);
        pages
    }

    #[test]
    fn test_direct_extraction() {
        let reader = DirectReader;
        let codec = ImageCrateCodec::new();
        let mut pages = pages_for(&reader);

        let mut extractor = PageExtractor::new(&reader, &codec, &pages.archive_path.clone());
        let extraction = extractor.try_extract(&pages.records[0]).unwrap();
        assert_eq!(extraction.image.dimensions(), (3, 5));
        assert!(extraction.primary_error.is_none());

        let images = extractor.extract_selected(&mut pages, &SilentProgress);
        extractor.finish();
        assert_eq!(images.len(), 1);
        assert!(pages.records[0].extracted);
        // Corrupt page failed both ways and keeps both causes
        assert!(!pages.records[1].extracted);
        assert_eq!(pages.records[1].extract_errors.len(), 2);
    }

    #[test]
    fn test_fallback_extracts_once_and_keeps_primary_error() {
        let reader = BulkOnlyReader {
            names: vec!["a/01.png", "a/02.png", "a/03.png"],
            extract_calls: Cell::new(0),
            extract_fails: false,
        };
        let codec = ImageCrateCodec::new();
        let mut pages = pages_for(&reader);
        let scratch = tempfile::tempdir().unwrap();

        let mut extractor = PageExtractor::new(&reader, &codec, &pages.archive_path.clone())
            .with_temp_root(Some(scratch.path().to_path_buf()));
        let images = extractor.extract_selected(&mut pages, &SilentProgress);
        extractor.finish();

        assert_eq!(images.len(), 3);
        assert_eq!(reader.extract_calls.get(), 1);
        for record in &pages.records {
            assert!(record.extracted);
            assert_eq!(record.extract_errors.len(), 1);
            assert!(record.extract_errors[0].contains("not found"));
        }
        // Temporary directory removed
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_fallback_is_not_retried() {
        let reader = BulkOnlyReader {
            names: vec!["01.png", "02.png"],
            extract_calls: Cell::new(0),
            extract_fails: true,
        };
        let codec = ImageCrateCodec::new();
        let mut pages = pages_for(&reader);

        let mut extractor = PageExtractor::new(&reader, &codec, &pages.archive_path.clone());
        let images = extractor.extract_selected(&mut pages, &SilentProgress);

        assert!(images.is_empty());
        assert_eq!(reader.extract_calls.get(), 1);
        let err = extractor.try_extract(&pages.records[0]).unwrap_err();
        assert_eq!(err.member, "01.png");
        assert!(err.fallback.contains("7z"));
        assert_eq!(reader.extract_calls.get(), 1);
    }
}
