//! Page number to page index resolution
//!
//! Converts signed, 1-based page numbers into 0-based indices bounded by the
//! total page count of an archive.

use super::types::{PageNumber, PageSpec};

/// Convert a signed page number into a 0-based index.
///
/// With `clamp` the result is always in bounds: numbers past either end
/// snap to the first or last page and `0` maps to the first page. Without
/// `clamp` an out-of-range number yields `None`.
pub fn to_index(total: usize, number: i64, clamp: bool) -> Option<usize> {
    if total == 0 {
        return None;
    }
    let total_i = total as i64;

    let index = if number >= total_i && clamp {
        total_i - 1
    } else if number <= -total_i && clamp {
        0
    } else if number < 0 {
        total_i + number
    } else if number == 0 && clamp {
        0
    } else {
        number - 1
    };

    if (0..total_i).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

/// Resolve a page spec into the ordered list of page indices to process.
pub fn resolve(total: usize, spec: &PageSpec) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }

    match spec {
        PageSpec::All => (0..total).collect(),
        PageSpec::Range { start, end } => resolve_range(
            total,
            start.as_ref().and_then(PageNumber::value),
            end.as_ref().and_then(PageNumber::value),
        ),
        PageSpec::List(pages) => resolve_list(total, pages),
        PageSpec::Single(page) => match page.value() {
            Some(n) => resolve_range(total, None, Some(n)),
            None => (0..total).collect(),
        },
    }
}

/// Expand an inclusive range of page numbers.
///
/// A missing start means the first page and a missing end the last page.
/// Both ends are clamped into bounds and the range is always walked from
/// the lower index to the higher one.
pub fn resolve_range(total: usize, start: Option<i64>, end: Option<i64>) -> Vec<usize> {
    let first = match start {
        Some(n) => to_index(total, n, true),
        None => Some(0),
    };
    let last = match end {
        Some(n) => to_index(total, n, true),
        None => total.checked_sub(1),
    };

    match (first, last) {
        (Some(a), Some(b)) => (a.min(b)..=a.max(b)).collect(),
        _ => Vec::new(),
    }
}

/// Resolve specific page numbers, keeping their relative order.
///
/// Zero and out-of-bounds numbers are dropped with a warning, disabled
/// entries are skipped silently and repeated pages are only kept once.
pub fn resolve_list(total: usize, pages: &[PageNumber]) -> Vec<usize> {
    let total_i = total as i64;
    let mut indices: Vec<usize> = Vec::with_capacity(pages.len());

    for page in pages {
        let Some(n) = page.value() else {
            tracing::debug!("Skipping disabled page {}", page);
            continue;
        };

        if n == 0 || n > total_i || n < -total_i {
            tracing::warn!(
                "Specific page #{} is out of bounds ({} pages) and will be disregarded",
                n,
                total
            );
            continue;
        }

        if let Some(index) = to_index(total, n, true) {
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
    }

    indices
}

/// Resolve a single edit target, clamping into bounds.
///
/// Used for rotate map keys. Returns `None` for disabled pages.
pub fn resolve_clamped(total: usize, page: &PageNumber) -> Option<usize> {
    page.value().and_then(|n| to_index(total, n, true))
}

/// Resolve a single edit target without clamping.
///
/// Used for combine partners, where an out-of-range page must surface as a
/// missing page rather than silently becoming the first or last one.
/// `Ok(None)` means disabled, `Err(n)` means page `n` is out of range.
pub fn resolve_exact(total: usize, page: &PageNumber) -> Result<Option<usize>, i64> {
    match page.value() {
        None => Ok(None),
        Some(n) => to_index(total, n, false).map(Some).ok_or(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_index_first_and_last() {
        for total in 1..50 {
            assert_eq!(to_index(total, 1, true), Some(0));
            assert_eq!(to_index(total, -1, true), Some(total - 1));
            assert_eq!(to_index(total, 1, false), Some(0));
            assert_eq!(to_index(total, -1, false), Some(total - 1));
        }
    }

    #[test]
    fn test_to_index_clamped() {
        assert_eq!(to_index(10, 100, true), Some(9));
        assert_eq!(to_index(10, -100, true), Some(0));
        assert_eq!(to_index(10, 0, true), Some(0));
        assert_eq!(to_index(10, -7, true), Some(3));
        assert_eq!(to_index(50, -7, true), Some(43));
    }

    #[test]
    fn test_to_index_unclamped_out_of_range() {
        assert_eq!(to_index(10, 10, false), Some(9));
        assert_eq!(to_index(10, 11, false), None);
        assert_eq!(to_index(10, -10, false), Some(0));
        assert_eq!(to_index(10, -11, false), None);
        assert_eq!(to_index(10, 0, false), None);
    }

    #[test]
    fn test_to_index_empty_archive() {
        assert_eq!(to_index(0, 1, true), None);
        assert_eq!(to_index(0, -1, false), None);
    }

    #[test]
    fn test_resolve_all() {
        assert_eq!(resolve(5, &PageSpec::All), vec![0, 1, 2, 3, 4]);
        assert!(resolve(0, &PageSpec::All).is_empty());
    }

    #[test]
    fn test_resolve_single_is_run_from_first_page() {
        for total in 1..20usize {
            for n in -(total as i64 + 3)..(total as i64 + 3) {
                let spec = PageSpec::Single(PageNumber::Number(n));
                let end = to_index(total, n, true).unwrap();
                let expected: Vec<usize> = (0..=end).collect();
                assert_eq!(resolve(total, &spec), expected, "total={} n={}", total, n);
            }
        }
    }

    #[test]
    fn test_resolve_disabled_single_is_all() {
        let spec = PageSpec::Single(PageNumber::Disabled("3".into()));
        assert_eq!(resolve(4, &spec), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve(10, &PageSpec::range(1, 5)), vec![0, 1, 2, 3, 4]);
        assert_eq!(resolve(10, &PageSpec::range(1, -1)).len(), 10);
        assert_eq!(resolve(10, &PageSpec::range(-10, -1)).len(), 10);
        assert_eq!(resolve(10, &PageSpec::range(10, -1)), vec![9]);
    }

    #[test]
    fn test_resolve_range_reversed_and_clamped() {
        assert_eq!(resolve(10, &PageSpec::range(-1, -3)), vec![7, 8, 9]);
        assert_eq!(resolve(10, &PageSpec::range(100, 8)), vec![7, 8, 9]);
        assert_eq!(resolve(3, &PageSpec::range(-100, 100)), vec![0, 1, 2]);
    }

    #[test]
    fn test_resolve_range_open_ends() {
        let spec = PageSpec::Range {
            start: Some(PageNumber::Number(8)),
            end: Some(PageNumber::Disabled("2".into())),
        };
        assert_eq!(resolve(10, &spec), vec![7, 8, 9]);

        let spec = PageSpec::Range {
            start: None,
            end: Some(PageNumber::Number(3)),
        };
        assert_eq!(resolve(10, &spec), vec![0, 1, 2]);
    }

    #[test]
    fn test_resolve_list_scenario() {
        assert_eq!(resolve(10, &PageSpec::list(&[1, 4, 5, -1])), vec![0, 3, 4, 9]);
    }

    #[test]
    fn test_resolve_list_drops_invalid_entries_keeping_order() {
        let spec = PageSpec::list(&[1, 4, 5, -1, 203, 0, 97, -100, -122, 7]);
        assert_eq!(resolve(10, &spec), vec![0, 3, 4, 9, 6]);
    }

    #[test]
    fn test_resolve_list_skips_disabled() {
        let spec = PageSpec::List(vec![
            PageNumber::Number(2),
            PageNumber::Disabled("3".into()),
            PageNumber::Number(-2),
        ]);
        assert_eq!(resolve(5, &spec), vec![1, 3]);
    }

    #[test]
    fn test_resolve_list_deduplicates() {
        assert_eq!(resolve(5, &PageSpec::list(&[5, -1, 1, 5])), vec![4, 0]);
    }

    #[test]
    fn test_resolve_exact() {
        assert_eq!(resolve_exact(10, &PageNumber::Number(-1)), Ok(Some(9)));
        assert_eq!(resolve_exact(10, &PageNumber::Number(12)), Err(12));
        assert_eq!(resolve_exact(10, &PageNumber::Disabled("4".into())), Ok(None));
    }

    #[test]
    fn test_resolve_clamped() {
        assert_eq!(resolve_clamped(10, &PageNumber::Number(12)), Some(9));
        assert_eq!(resolve_clamped(10, &PageNumber::Disabled("1".into())), None);
    }
}
