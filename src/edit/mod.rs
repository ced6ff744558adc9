//! Edit Pipeline module
//!
//! Applies resize, rotate and combine edits to the selected pages of one
//! archive, strictly in that order.
//!
//! # Failure policy
//!
//! - A resize failure blocks rotating and combining that page
//! - Any earlier failure on either partner blocks a combine
//! - Targets outside the selection are recorded as [`SelectionError`]s
//! - Pages without an image (failed extraction) are skipped silently
//!
//! # Example
//!
//! ```rust,no_run
//! use comic_page_extract::{
//!     ArchivePages, CombineSpec, EditOptions, EditPipeline, ImageCrateCodec, RotateSpec,
//!     SizeChange, WorkingImageSet,
//! };
//!
//! let options = EditOptions::builder()
//!     .height(SizeChange::Downscale(1080))
//!     .rotate(RotateSpec::pages(&[(1, 90.0)], None))
//!     .combine(CombineSpec::horizontal(4, 5))
//!     .build();
//!
//! # fn load() -> (ArchivePages, WorkingImageSet) { unimplemented!() }
//! let (mut pages, mut images) = load();
//! let codec = ImageCrateCodec::new();
//! EditPipeline::new(&options, &codec).run(&mut pages, &mut images);
//! ```

// Submodules
mod compose;
mod pipeline;
mod size;
mod types;

// Re-export public API
pub use compose::combine_images;
pub use pipeline::{EditPipeline, WorkingImageSet};
pub use size::compute_target_size;
pub use types::{
    parse_percent, CombineSpec, EditError, EditOptions, EditOptionsBuilder, PercentOrNumber,
    RawSizeChange, Result, RotateSpec, SelectionError, SizeChange, SizeChangeMode,
};
