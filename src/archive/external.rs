//! External tool archive reader
//!
//! RAR-compressed CBR files cannot be read by the `zip` crate, so listing,
//! member reads and bulk extraction shell out to `7z` (or `unrar` for bulk
//! extraction when 7-Zip is not installed).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

use super::types::{
    ArchiveError, ArchiveMember, ArchiveReader, Result, SEVEN_ZIP_COMMANDS, UNRAR_COMMAND,
};

/// Archive reader backed by command-line tools found on `PATH`
#[derive(Debug, Clone, Default)]
pub struct ExternalToolReader {
    seven_zip: Option<PathBuf>,
    unrar: Option<PathBuf>,
}

impl ExternalToolReader {
    /// Locate the tools with `which`
    pub fn detect() -> Self {
        let seven_zip = SEVEN_ZIP_COMMANDS
            .iter()
            .find_map(|cmd| which::which(cmd).ok());
        let unrar = which::which(UNRAR_COMMAND).ok();
        debug!("archive tools: 7z={:?} unrar={:?}", seven_zip, unrar);
        Self { seven_zip, unrar }
    }

    /// Whether any tool is available
    pub fn is_available(&self) -> bool {
        self.seven_zip.is_some() || self.unrar.is_some()
    }

    fn seven_zip(&self) -> Result<&Path> {
        self.seven_zip
            .as_deref()
            .ok_or_else(|| ArchiveError::ToolNotFound(SEVEN_ZIP_COMMANDS.join(", ")))
    }

    fn run(tool: &Path, args: &[&OsStr]) -> Result<Output> {
        let output = Command::new(tool).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::ToolFailed {
                tool: tool.display().to_string(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(output)
    }
}

impl ArchiveReader for ExternalToolReader {
    fn list_members(&self, archive: &Path) -> Result<Vec<ArchiveMember>> {
        if !archive.exists() {
            return Err(ArchiveError::NotFound(archive.to_path_buf()));
        }
        let tool = self.seven_zip()?;
        let output = Self::run(
            tool,
            &[OsStr::new("l"), OsStr::new("-slt"), OsStr::new("-ba"), archive.as_os_str()],
        )?;
        Ok(parse_slt_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn open_member(&self, archive: &Path, name: &str) -> Result<Vec<u8>> {
        let tool = self.seven_zip()?;
        let output = Self::run(
            tool,
            &[
                OsStr::new("e"),
                OsStr::new("-so"),
                archive.as_os_str(),
                OsStr::new(name),
            ],
        )?;
        if output.stdout.is_empty() {
            return Err(ArchiveError::MemberNotFound(name.to_string()));
        }
        Ok(output.stdout)
    }

    fn extract_all(&self, archive: &Path, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;

        if let Some(tool) = &self.seven_zip {
            let out_flag = format!("-o{}", dest.display());
            Self::run(
                tool,
                &[
                    OsStr::new("x"),
                    OsStr::new("-y"),
                    OsStr::new(&out_flag),
                    archive.as_os_str(),
                ],
            )?;
            return Ok(());
        }

        if let Some(tool) = &self.unrar {
            // unrar treats a trailing separator as the destination directory
            let dest_dir = format!("{}{}", dest.display(), std::path::MAIN_SEPARATOR);
            Self::run(
                tool,
                &[
                    OsStr::new("x"),
                    OsStr::new("-o+"),
                    archive.as_os_str(),
                    OsStr::new(&dest_dir),
                ],
            )?;
            return Ok(());
        }

        Err(ArchiveError::ToolNotFound(format!(
            "{}, {}",
            SEVEN_ZIP_COMMANDS.join(", "),
            UNRAR_COMMAND
        )))
    }
}

/// Parse `7z l -slt` technical listing output into file members
pub fn parse_slt_listing(listing: &str) -> Vec<ArchiveMember> {
    let mut members = Vec::new();
    let mut path: Option<String> = None;
    let mut is_dir = false;

    let mut flush = |path: &mut Option<String>, is_dir: &mut bool| {
        if let Some(p) = path.take() {
            if !*is_dir {
                members.push(ArchiveMember::new(p));
            }
        }
        *is_dir = false;
    };

    for line in listing.lines() {
        if let Some(value) = line.strip_prefix("Path = ") {
            flush(&mut path, &mut is_dir);
            path = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("Folder = ") {
            is_dir |= value.trim() == "+";
        } else if let Some(value) = line.strip_prefix("Attributes = ") {
            is_dir |= value.trim_start().starts_with('D');
        }
    }
    flush(&mut path, &mut is_dir);

    members
}
