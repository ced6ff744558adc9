//! ZIP-backed archive reader (CBZ and mislabelled CBR files)

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use super::types::{ArchiveError, ArchiveMember, ArchiveReader, Result};

/// Reads ZIP archives with the `zip` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipReader;

impl ZipReader {
    pub fn new() -> Self {
        Self
    }

    fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>> {
        if !archive.exists() {
            return Err(ArchiveError::NotFound(archive.to_path_buf()));
        }
        let file = File::open(archive)?;
        ZipArchive::new(BufReader::new(file)).map_err(|e| match e {
            ZipError::InvalidArchive(msg) | ZipError::UnsupportedArchive(msg) => {
                ArchiveError::InvalidArchive(format!("{}: {}", archive.display(), msg))
            }
            other => ArchiveError::Zip(other),
        })
    }
}

impl ArchiveReader for ZipReader {
    fn list_members(&self, archive: &Path) -> Result<Vec<ArchiveMember>> {
        let mut zip = Self::open(archive)?;

        let mut members = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            if !entry.is_dir() {
                members.push(ArchiveMember::new(entry.name()));
            }
        }
        debug!("{} members in {}", members.len(), archive.display());
        Ok(members)
    }

    fn open_member(&self, archive: &Path, name: &str) -> Result<Vec<u8>> {
        let mut zip = Self::open(archive)?;
        let mut entry = match zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(ArchiveError::MemberNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut zip = Self::open(archive)?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let entry_path = match entry.enclosed_name() {
                Some(p) => p.to_path_buf(),
                None => continue,
            };

            let output_path = dest.join(&entry_path);
            if entry.is_dir() {
                fs::create_dir_all(&output_path)?;
            } else {
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&output_path)?;
                std::io::copy(&mut entry, &mut outfile)?;
            }
        }
        Ok(())
    }
}
