//! CLI argument definitions
//!
//! Command-line arguments parsed with clap. Option values that also appear
//! in presets are converted into [`CliOverrides`] by [`create_cli_overrides`],
//! so only flags the user actually passed replace preset values.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::codec::{OutputFormat, ResampleFilter};
use crate::config::CliOverrides;
use crate::edit::{CombineSpec, RotateSpec, SizeChange};
use crate::page_spec::{parse_page_spec, PageSpec};
use crate::record::{SortMethod, SortOrder};
use crate::save::NameTemplate;

/// Process exit codes
pub mod exit_codes {
    /// Successful completion
    pub const SUCCESS: i32 = 0;
    /// General error, including runs where pages failed
    pub const GENERAL_ERROR: i32 = 1;
    /// Input path or archives not found
    pub const INPUT_NOT_FOUND: i32 = 2;
    /// Config file unreadable or preset unknown
    pub const CONFIG_ERROR: i32 = 3;
}

/// Extract, edit and save page images from comic book archives
#[derive(Debug, Parser)]
#[command(name = "comic-page-extract")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v stage progress and debug logs, -vv per-run details)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract pages from archives, edit them and save them as images
    Extract(ExtractArgs),
    /// List the available presets
    Presets(PresetsArgs),
    /// Show the sorted page list of an archive
    Inspect(InspectArgs),
    /// Show system information and archive tool availability
    Info,
}

/// Page name ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    /// Plain string order
    Alpha,
    /// Natural order, numbers compared by value
    Natural,
    /// Only the digits of each name
    Numbers,
}

impl From<SortArg> for SortMethod {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Alpha => SortMethod::Alpha,
            SortArg::Natural => SortMethod::AlphaNumber,
            SortArg::Numbers => SortMethod::NumbersOnly,
        }
    }
}

/// Resampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResampleArg {
    Nearest,
    Bilinear,
    Bicubic,
}

impl From<ResampleArg> for ResampleFilter {
    fn from(arg: ResampleArg) -> Self {
        match arg {
            ResampleArg::Nearest => ResampleFilter::Nearest,
            ResampleArg::Bilinear => ResampleFilter::Bilinear,
            ResampleArg::Bicubic => ResampleFilter::Bicubic,
        }
    }
}

/// One `--rotate-page PAGE:DEGREES` value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRotation {
    pub page: i64,
    pub degrees: f32,
}

impl FromStr for PageRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (page, degrees) = s
            .split_once(':')
            .ok_or_else(|| format!("expected PAGE:DEGREES, got {:?}", s))?;
        Ok(Self {
            page: page
                .trim()
                .parse()
                .map_err(|_| format!("invalid page number {:?}", page))?,
            degrees: degrees
                .trim()
                .parse()
                .map_err(|_| format!("invalid angle {:?}", degrees))?,
        })
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| format!("unsupported image format {:?}", s))
}

fn parse_template(s: &str) -> Result<NameTemplate, String> {
    NameTemplate::parse(s).map_err(|e| e.to_string())
}

/// Arguments for the extract command
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Archives, or directories containing archives
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (default: ./comic-page-extract.toml, then the user config dir)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Preset to start from
    #[arg(short = 'P', long)]
    pub preset: Option<String>,

    /// Pages to extract: all, 3, 1..5, 1,4,5,-1
    #[arg(short, long, value_parser = parse_page_spec, allow_hyphen_values = true)]
    pub pages: Option<PageSpec>,

    /// How page names are sorted before numbering
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Number pages in descending name order
    #[arg(long)]
    pub descending: bool,

    /// Width change: 800, +20, -20, 50%, up:800, down:800
    #[arg(long, allow_hyphen_values = true)]
    pub width: Option<SizeChange>,

    /// Height change: 1080, +20, -20, 50%, up:1080, down:1080
    #[arg(long, allow_hyphen_values = true)]
    pub height: Option<SizeChange>,

    /// Do not derive the unchanged dimension from the aspect ratio
    #[arg(long)]
    pub no_aspect_ratio: bool,

    /// Rotate every selected page counter-clockwise
    #[arg(long, value_name = "DEGREES", allow_hyphen_values = true)]
    pub rotate: Option<f32>,

    /// Rotate one page counter-clockwise (repeatable)
    #[arg(long = "rotate-page", value_name = "PAGE:DEGREES", allow_hyphen_values = true)]
    pub rotate_pages: Vec<PageRotation>,

    /// Combine two pages, horizontally unless prefixed with v: (repeatable)
    #[arg(long, value_name = "[h:|v:]A:B", allow_hyphen_values = true)]
    pub combine: Vec<CombineSpec>,

    /// Resampling filter for resize, rotate and combine
    #[arg(long, value_enum)]
    pub resample: Option<ResampleArg>,

    /// Save every page in this format instead of its source format
    #[arg(short, long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Search directories recursively for archives
    #[arg(short, long)]
    pub recursive: bool,

    /// Replace files that already exist
    #[arg(long, conflicts_with = "no_overwrite")]
    pub overwrite: bool,

    /// Keep files that already exist
    #[arg(long)]
    pub no_overwrite: bool,

    /// File name template: {archive}, {member}, {page}, {counter}
    #[arg(long = "name", value_name = "TEMPLATE", value_parser = parse_template)]
    pub name_template: Option<NameTemplate>,

    /// Save directory (repeatable; pages rotate through them)
    #[arg(short = 'o', long = "save-dir", value_name = "DIR")]
    pub save_dirs: Vec<PathBuf>,

    /// Do not recreate the archive's internal folders
    #[arg(long)]
    pub flat: bool,

    /// Root for relative save directories and the default log
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Text log location
    #[arg(long, value_name = "FILE", conflicts_with = "no_log")]
    pub log: Option<PathBuf>,

    /// Do not write a text log
    #[arg(long)]
    pub no_log: bool,

    /// Also write the run report as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Directory for temporary extraction folders
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Show the execution plan without extracting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress and summary output
    #[arg(short, long)]
    pub quiet: bool,
}

impl ExtractArgs {
    /// Rotation targets, if any rotate flag was given
    pub fn rotate_spec(&self) -> Option<RotateSpec> {
        if !self.rotate_pages.is_empty() {
            let pages: Vec<(i64, f32)> = self
                .rotate_pages
                .iter()
                .map(|r| (r.page, r.degrees))
                .collect();
            return Some(RotateSpec::pages(&pages, self.rotate));
        }
        self.rotate.map(RotateSpec::all)
    }

    /// Explicit overwrite choice, if any
    pub fn effective_overwrite(&self) -> Option<bool> {
        if self.overwrite {
            Some(true)
        } else if self.no_overwrite {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for the presets command
#[derive(Debug, Args)]
pub struct PresetsArgs {
    /// Config file to read presets from
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print one preset in full as TOML
    #[arg(long, value_name = "NAME")]
    pub show: Option<String>,
}

/// Arguments for the inspect command
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Archive to list
    pub archive: PathBuf,

    /// How page names are sorted
    #[arg(long, value_enum, default_value_t = SortArg::Alpha)]
    pub sort: SortArg,

    /// Descending name order
    #[arg(long)]
    pub descending: bool,

    /// Mark the pages this selection picks
    #[arg(short, long, value_parser = parse_page_spec, allow_hyphen_values = true)]
    pub pages: Option<PageSpec>,
}

impl InspectArgs {
    pub fn sort_order(&self) -> SortOrder {
        if self.descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

/// Create CLI overrides from ExtractArgs
///
/// Flags left at their defaults produce `None` so the preset's value is kept.
pub fn create_cli_overrides(args: &ExtractArgs) -> CliOverrides {
    let mut overrides = CliOverrides::new();

    overrides.pages = args.pages.clone();
    overrides.sort_method = args.sort.map(SortMethod::from);
    if args.descending {
        overrides.sort_order = Some(SortOrder::Descending);
    }

    // Edits
    overrides.width = args.width;
    overrides.height = args.height;
    if args.no_aspect_ratio {
        overrides.keep_aspect_ratio = Some(false);
    }
    overrides.rotate = args.rotate_spec();
    overrides.combine = args.combine.clone();
    overrides.resample = args.resample.map(ResampleFilter::from);

    // Saving
    overrides.format = args.format;
    if args.recursive {
        overrides.search_sub_dirs = Some(true);
    }
    overrides.overwrite = args.effective_overwrite();
    overrides.name_template = args.name_template.clone();
    overrides.save_dirs = args.save_dirs.clone();
    if args.flat {
        overrides.keep_archive_paths = Some(false);
    }
    overrides.default_root = args.output_root.clone();

    // Reports
    if args.no_log {
        overrides.create_log = Some(false);
    } else if args.log.is_some() {
        overrides.create_log = Some(true);
    }
    overrides.log_path = args.log.clone();
    overrides.json_report = args.json.clone();
    overrides.temp_root = args.temp_dir.clone();

    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::Direction;
    use crate::page_spec::PageNumber;
    use clap::CommandFactory;

    fn extract(args: &[&str]) -> ExtractArgs {
        let mut argv = vec!["comic-page-extract", "extract"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Extract(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_leave_preset_untouched() {
        let args = extract(&["book.cbz"]);
        let overrides = create_cli_overrides(&args);

        assert_eq!(args.inputs, vec![PathBuf::from("book.cbz")]);
        assert!(overrides.pages.is_none());
        assert!(overrides.width.is_none());
        assert!(overrides.rotate.is_none());
        assert!(overrides.combine.is_empty());
        assert!(overrides.overwrite.is_none());
        assert!(overrides.keep_archive_paths.is_none());
        assert!(overrides.create_log.is_none());
    }

    #[test]
    fn test_edit_flags() {
        let args = extract(&[
            "book.cbz",
            "--pages",
            "1,4,5,-1",
            "--height",
            "down:1080",
            "--width",
            "-20",
            "--combine",
            "4:5",
            "--combine",
            "v:4:-1",
            "--resample",
            "bicubic",
            "--no-aspect-ratio",
        ]);
        let overrides = create_cli_overrides(&args);

        assert_eq!(overrides.pages, Some(PageSpec::list(&[1, 4, 5, -1])));
        assert_eq!(overrides.height, Some(SizeChange::Downscale(1080)));
        assert_eq!(overrides.width, Some(SizeChange::ModifyByPixels(-20)));
        assert_eq!(overrides.combine.len(), 2);
        assert_eq!(overrides.combine[1].direction, Direction::Vertical);
        assert_eq!(overrides.combine[1].b, PageNumber::Number(-1));
        assert_eq!(overrides.resample, Some(ResampleFilter::Bicubic));
        assert_eq!(overrides.keep_aspect_ratio, Some(false));
    }

    #[test]
    fn test_rotate_flags() {
        let all = extract(&["book.cbz", "--rotate", "-90"]);
        assert_eq!(all.rotate_spec(), Some(RotateSpec::All(-90.0)));

        let pages = extract(&[
            "book.cbz",
            "--rotate-page",
            "1:90",
            "--rotate-page",
            "-1:180",
            "--rotate",
            "45",
        ]);
        assert_eq!(
            pages.rotate_spec(),
            Some(RotateSpec::pages(&[(1, 90.0), (-1, 180.0)], Some(45.0)))
        );

        assert!("1".parse::<PageRotation>().is_err());
        assert!("x:90".parse::<PageRotation>().is_err());
    }

    #[test]
    fn test_save_and_log_flags() {
        let args = extract(&[
            "comics/",
            "-r",
            "--overwrite",
            "--flat",
            "--name",
            "{archive}-{page}",
            "-o",
            "a",
            "-o",
            "b",
            "--format",
            "png",
            "--no-log",
        ]);
        let overrides = create_cli_overrides(&args);

        assert_eq!(overrides.search_sub_dirs, Some(true));
        assert_eq!(overrides.overwrite, Some(true));
        assert_eq!(overrides.keep_archive_paths, Some(false));
        assert_eq!(overrides.save_dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(overrides.format, Some(OutputFormat::Png));
        assert_eq!(overrides.create_log, Some(false));
        assert_eq!(
            overrides.name_template.map(|t| t.to_string()),
            Some("{archive}-{page}".to_string())
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let parse = |args: &[&str]| {
            let mut argv = vec!["comic-page-extract", "extract", "book.cbz"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv)
        };

        assert!(parse(&["--name", "{volume}"]).is_err());
        assert!(parse(&["--format", "psd"]).is_err());
        assert!(parse(&["--pages", "one"]).is_err());
        assert!(parse(&["--combine", "4"]).is_err());
        assert!(parse(&["--overwrite", "--no-overwrite"]).is_err());
        assert!(parse(&["--log", "x.txt", "--no-log"]).is_err());
        assert!(Cli::try_parse_from(["comic-page-extract", "extract"]).is_err());
    }

    #[test]
    fn test_verbose_is_global_and_counted() {
        let cli = Cli::try_parse_from(["comic-page-extract", "inspect", "book.cbz", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.sort, SortArg::Alpha);
                assert_eq!(args.sort_order(), SortOrder::Ascending);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sort_flags() {
        let args = extract(&["book.cbz", "--sort", "natural", "--descending"]);
        let overrides = create_cli_overrides(&args);
        assert_eq!(overrides.sort_method, Some(SortMethod::AlphaNumber));
        assert_eq!(overrides.sort_order, Some(SortOrder::Descending));
    }
}
