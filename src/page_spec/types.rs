//! Page specification core types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================
// Error Types
// ============================================================

/// Page specification error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageSpecError {
    #[error("Empty page specification")]
    Empty,

    #[error("Invalid page number: {0}")]
    InvalidNumber(String),

    #[error("Invalid page specification: {0}")]
    InvalidSpec(String),
}

pub type Result<T> = std::result::Result<T, PageSpecError>;

// ============================================================
// Page Numbers
// ============================================================

/// A user-facing, 1-based, signed page number.
///
/// Negative numbers count back from the last page (`-1` is the last page).
/// A page number written as a string is disabled: it is skipped wherever it
/// appears without affecting the entries around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageNumber {
    /// Active page number
    Number(i64),
    /// Disabled page reference
    Disabled(String),
}

impl PageNumber {
    /// The numeric value, or `None` when disabled
    pub fn value(&self) -> Option<i64> {
        match self {
            PageNumber::Number(n) => Some(*n),
            PageNumber::Disabled(_) => None,
        }
    }

    /// Whether this page reference has been disabled
    pub fn is_disabled(&self) -> bool {
        matches!(self, PageNumber::Disabled(_))
    }
}

impl From<i64> for PageNumber {
    fn from(value: i64) -> Self {
        PageNumber::Number(value)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageNumber::Number(n) => write!(f, "{}", n),
            PageNumber::Disabled(s) => write!(f, "'{}'", s),
        }
    }
}

// ============================================================
// Page Specification
// ============================================================

/// Which pages of an archive to process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPageSpec", into = "RawPageSpec")]
pub enum PageSpec {
    /// Every page
    #[default]
    All,
    /// Inclusive range; a missing or disabled end falls back to the first
    /// (start) or last (end) page
    Range {
        start: Option<PageNumber>,
        end: Option<PageNumber>,
    },
    /// Specific pages in the given order
    List(Vec<PageNumber>),
    /// A bare page number: pages 1 through N
    Single(PageNumber),
}

impl PageSpec {
    /// Build a range spec from two active page numbers
    pub fn range(start: i64, end: i64) -> Self {
        PageSpec::Range {
            start: Some(PageNumber::Number(start)),
            end: Some(PageNumber::Number(end)),
        }
    }

    /// Build a list spec from active page numbers
    pub fn list(pages: &[i64]) -> Self {
        PageSpec::List(pages.iter().map(|&n| PageNumber::Number(n)).collect())
    }
}

impl fmt::Display for PageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSpec::All => write!(f, "all"),
            PageSpec::Range { start, end } => {
                if let Some(start) = start {
                    write!(f, "{}", start)?;
                }
                write!(f, "..")?;
                if let Some(end) = end {
                    write!(f, "{}", end)?;
                }
                Ok(())
            }
            PageSpec::List(pages) => {
                let parts: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            PageSpec::Single(page) => write!(f, "{}", page),
        }
    }
}

/// Serialized shape of a [`PageSpec`] in configuration files.
///
/// `pages = "all"`, `pages = 3`, `pages = [1, 4, "5", -1]` or
/// `pages = { start = 1, end = -1 }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPageSpec {
    Number(i64),
    Keyword(String),
    List(Vec<PageNumber>),
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<PageNumber>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<PageNumber>,
    },
}

impl TryFrom<RawPageSpec> for PageSpec {
    type Error = PageSpecError;

    fn try_from(raw: RawPageSpec) -> Result<Self> {
        match raw {
            RawPageSpec::Number(n) => Ok(PageSpec::Single(PageNumber::Number(n))),
            RawPageSpec::Keyword(word) if word.eq_ignore_ascii_case("all") => Ok(PageSpec::All),
            // A disabled bare page removes the restriction
            RawPageSpec::Keyword(word) => Ok(PageSpec::Single(PageNumber::Disabled(word))),
            RawPageSpec::List(pages) if pages.is_empty() => Ok(PageSpec::All),
            RawPageSpec::List(pages) => Ok(PageSpec::List(pages)),
            RawPageSpec::Range { start, end } => Ok(PageSpec::Range { start, end }),
        }
    }
}

impl From<PageSpec> for RawPageSpec {
    fn from(spec: PageSpec) -> Self {
        match spec {
            PageSpec::All => RawPageSpec::Keyword("all".to_string()),
            PageSpec::Range { start, end } => RawPageSpec::Range { start, end },
            PageSpec::List(pages) => RawPageSpec::List(pages),
            PageSpec::Single(PageNumber::Number(n)) => RawPageSpec::Number(n),
            PageSpec::Single(PageNumber::Disabled(s)) => RawPageSpec::Keyword(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        pages: PageSpec,
    }

    fn parse(toml_src: &str) -> PageSpec {
        toml::from_str::<Wrapper>(toml_src).unwrap().pages
    }

    #[test]
    fn test_deserialize_single() {
        assert_eq!(parse("pages = 3"), PageSpec::Single(PageNumber::Number(3)));
    }

    #[test]
    fn test_deserialize_all_keyword() {
        assert_eq!(parse("pages = \"all\""), PageSpec::All);
        assert_eq!(parse("pages = \"ALL\""), PageSpec::All);
    }

    #[test]
    fn test_deserialize_list_with_disabled_entry() {
        let spec = parse("pages = [1, \"4\", -1]");
        assert_eq!(
            spec,
            PageSpec::List(vec![
                PageNumber::Number(1),
                PageNumber::Disabled("4".to_string()),
                PageNumber::Number(-1),
            ])
        );
    }

    #[test]
    fn test_deserialize_empty_list_means_all() {
        assert_eq!(parse("pages = []"), PageSpec::All);
    }

    #[test]
    fn test_deserialize_range_table() {
        assert_eq!(parse("pages = { start = 1, end = -1 }"), PageSpec::range(1, -1));

        let open = parse("pages = { end = 5 }");
        assert_eq!(
            open,
            PageSpec::Range {
                start: None,
                end: Some(PageNumber::Number(5))
            }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PageSpec::All.to_string(), "all");
        assert_eq!(PageSpec::range(2, -1).to_string(), "2..-1");
        assert_eq!(PageSpec::list(&[1, 4, -1]).to_string(), "1,4,-1");
        assert_eq!(
            PageNumber::Disabled("5".to_string()).to_string(),
            "'5'"
        );
    }

    #[test]
    fn test_page_number_value() {
        assert_eq!(PageNumber::Number(-2).value(), Some(-2));
        assert_eq!(PageNumber::Disabled("x".into()).value(), None);
        assert!(PageNumber::Disabled("x".into()).is_disabled());
    }
}
