//! Page Index Resolver module
//!
//! Translates user page numbers into stable 0-based page indices.
//!
//! # Features
//!
//! - Signed page numbers (`-1` is the last page)
//! - Ranges clamped into bounds, specific lists filtered with warnings
//! - Disabled (string) page references that are skipped in place
//! - Clamped and exact variants for edit targets
//!
//! # Example
//!
//! ```rust
//! use comic_page_extract::{resolve, PageSpec};
//!
//! let indices = resolve(10, &PageSpec::list(&[1, 4, 5, -1]));
//! assert_eq!(indices, vec![0, 3, 4, 9]);
//! ```

mod parse;
mod resolve;
mod types;

pub use parse::{parse_page_number, parse_page_spec};
pub use resolve::{resolve, resolve_clamped, resolve_exact, resolve_list, resolve_range, to_index};
pub use types::{PageNumber, PageSpec, PageSpecError, RawPageSpec, Result};
