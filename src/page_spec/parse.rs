//! Command-line page specification parsing
//!
//! Accepted forms:
//!
//! - `all` - every page
//! - `3` or `-1` - a bare page number (pages 1 through N)
//! - `1..5`, `..5`, `10..`, `1..-1` - an inclusive range
//! - `1,4,5,-1` - specific pages; a quoted entry such as `'4'` is disabled

use super::types::{PageNumber, PageSpec, PageSpecError, Result};

/// Parse a page specification string
pub fn parse_page_spec(s: &str) -> Result<PageSpec> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PageSpecError::Empty);
    }

    if s.eq_ignore_ascii_case("all") {
        return Ok(PageSpec::All);
    }

    if s.contains(',') {
        let pages = s
            .split(',')
            .map(|part| parse_page_number(part.trim()))
            .collect::<Result<Vec<_>>>()?;
        return Ok(PageSpec::List(pages));
    }

    if let Some((start, end)) = s.split_once("..") {
        let start = parse_optional_end(start)?;
        let end = parse_optional_end(end)?;
        if start.is_none() && end.is_none() {
            return Ok(PageSpec::All);
        }
        return Ok(PageSpec::Range { start, end });
    }

    Ok(PageSpec::Single(parse_page_number(s)?))
}

/// Parse one page number, honouring the quoted "disabled" form
pub fn parse_page_number(s: &str) -> Result<PageNumber> {
    let s = s.trim();
    if s.is_empty() {
        return Err(PageSpecError::InvalidSpec("empty list entry".to_string()));
    }

    if let Some(inner) = strip_quotes(s) {
        return Ok(PageNumber::Disabled(inner.to_string()));
    }

    s.parse::<i64>()
        .map(PageNumber::Number)
        .map_err(|_| PageSpecError::InvalidNumber(s.to_string()))
}

fn parse_optional_end(s: &str) -> Result<Option<PageNumber>> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("end") {
        Ok(None)
    } else {
        parse_page_number(s).map(Some)
    }
}

fn strip_quotes(s: &str) -> Option<&str> {
    ['\'', '"'].iter().find_map(|&q| {
        s.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}
