//! comic-page-extract - Extract, edit and save comic archive pages
//!
//! Reads page images out of CBZ/CBR archives, optionally resizes, rotates
//! and combines them, and writes the results with a per-run log.
//!
//! # Modules
//!
//! - [`page_spec`] - signed, 1-based page references and their resolution
//! - [`archive`] - archive listing and reading (zip, external 7-Zip/unrar)
//! - [`record`] - per-page records and the sorted page table
//! - [`extract`] - page decoding with the bulk-extraction fallback
//! - [`edit`] - resize, rotate and combine pipeline
//! - [`combine`] - which pages were merged into which
//! - [`save`] - output path planning and writing
//! - [`report`] - text log and JSON report
//! - [`config`] - presets and config file loading
//! - [`runner`] - one run over any number of archives
//!
//! # Example
//!
//! ```rust,no_run
//! use comic_page_extract::{Config, CliOverrides, RunContext, SilentProgress};
//! use std::path::Path;
//!
//! let config = Config::load().unwrap();
//! let run_config = config.merge_with_cli(Some("box"), &CliOverrides::new()).unwrap();
//!
//! let mut context = RunContext::new(run_config);
//! context.add_path(Path::new("comics")).unwrap();
//! let summary = context.run(&SilentProgress);
//! context.write_reports().unwrap();
//! println!("{} pages saved", summary.pages_saved);
//! ```

pub mod archive;
pub mod cli;
pub mod codec;
pub mod combine;
pub mod config;
pub mod edit;
pub mod extract;
pub mod page_spec;
pub mod progress;
pub mod record;
pub mod report;
pub mod runner;
pub mod save;
pub mod util;

// Re-exports for convenience
pub use archive::{
    is_archive_path, ArchiveError, ArchiveMember, ArchiveReader, ExternalToolReader,
    StandardArchiveReader, ZipReader,
};
pub use cli::{
    create_cli_overrides, exit_codes, Cli, Commands, ExtractArgs, InspectArgs, PresetsArgs,
};
pub use codec::{CodecError, ImageCodec, ImageCrateCodec, OutputFormat, ResampleFilter};
pub use combine::{CombineGraph, Direction};
pub use config::{builtin_presets, CliOverrides, Config, ConfigError, Preset, RunConfig};
pub use edit::{
    CombineSpec, EditError, EditOptions, EditPipeline, RotateSpec, SelectionError, SizeChange,
    WorkingImageSet,
};
pub use extract::{ExtractError, PageExtractor};
pub use page_spec::{parse_page_spec, resolve, PageNumber, PageSpec, PageSpecError};
pub use progress::{ProcessingStage, ProgressCallback, RunSummary, SilentProgress};
pub use record::{ArchivePages, EditRecord, PageRecord, PageSort, SaveOutcome, SortMethod, SortOrder};
pub use report::{ArchiveReport, ReportError, RunReport};
pub use runner::{inspect, ArchivePlan, RunContext, RunError};
pub use save::{NameTemplate, SaveError, SaveOptions, SavePlanner};
