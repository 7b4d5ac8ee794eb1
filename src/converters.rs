//! Path converters
//!
//! A converter owns the pattern a path segment must match, turns the
//! matched text into a typed value and renders a value back into a
//! segment. A segment that does not match is a 404 at the call site.

use once_cell::sync::Lazy;
use regex::Regex;

/// Converts one path segment to and from a typed value
pub trait PathConverter {
    type Value;

    /// Pattern the whole segment must match
    const PATTERN: &'static str;

    /// `None` when `segment` does not match `PATTERN`
    fn to_value(segment: &str) -> Option<Self::Value>;

    fn to_url(value: &Self::Value) -> String;
}

fn anchored(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{})$", pattern)).expect("converter pattern is a valid regex")
}

/// Four-digit year, rendered back zero-padded (`0999`)
pub struct YearConverter;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| anchored(YearConverter::PATTERN));

impl PathConverter for YearConverter {
    type Value = i32;

    const PATTERN: &'static str = "[0-9]{4}";

    fn to_value(segment: &str) -> Option<i32> {
        if !YEAR_RE.is_match(segment) {
            return None;
        }
        segment.parse().ok()
    }

    fn to_url(value: &i32) -> String {
        format!("{:04}", value)
    }
}

/// Slug that may also contain underscores, passed through unchanged
pub struct SlugWithUnderscoreConverter;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| anchored(SlugWithUnderscoreConverter::PATTERN));

impl PathConverter for SlugWithUnderscoreConverter {
    type Value = String;

    const PATTERN: &'static str = "[a-zA-Z0-9_-]+";

    fn to_value(segment: &str) -> Option<String> {
        SLUG_RE.is_match(segment).then(|| segment.to_string())
    }

    fn to_url(value: &String) -> String {
        value.clone()
    }
}

/// Non-negative integer
pub struct IntConverter;

static INT_RE: Lazy<Regex> = Lazy::new(|| anchored(IntConverter::PATTERN));

impl PathConverter for IntConverter {
    type Value = u32;

    const PATTERN: &'static str = "[0-9]+";

    fn to_value(segment: &str) -> Option<u32> {
        if !INT_RE.is_match(segment) {
            return None;
        }
        segment.parse().ok()
    }

    fn to_url(value: &u32) -> String {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_year_converter() {
        assert_eq!(YearConverter::to_value("2024"), Some(2024));
        assert_eq!(YearConverter::to_value("0999"), Some(999));
        assert_eq!(YearConverter::to_value("999"), None);
        assert_eq!(YearConverter::to_value("20245"), None);
        assert_eq!(YearConverter::to_value("20a4"), None);
        assert_eq!(YearConverter::to_value("+202"), None);

        assert_eq!(YearConverter::to_url(&2024), "2024");
        assert_eq!(YearConverter::to_url(&7), "0007");
    }

    #[test]
    fn test_slug_converter() {
        assert_eq!(
            SlugWithUnderscoreConverter::to_value("my_post-2"),
            Some("my_post-2".to_string())
        );
        assert_eq!(SlugWithUnderscoreConverter::to_value("has space"), None);
        assert_eq!(SlugWithUnderscoreConverter::to_value(""), None);
        assert_eq!(SlugWithUnderscoreConverter::to_value("dot.ted"), None);
        assert_eq!(SlugWithUnderscoreConverter::to_url(&"abc_def".to_string()), "abc_def");
    }

    #[test]
    fn test_int_converter() {
        assert_eq!(IntConverter::to_value("7"), Some(7));
        assert_eq!(IntConverter::to_value("007"), Some(7));
        assert_eq!(IntConverter::to_value("-1"), None);
        assert_eq!(IntConverter::to_value("99999999999"), None);
    }

    proptest! {
        #[test]
        fn prop_year_round_trips_through_url(year in 0i32..=9999) {
            let segment = YearConverter::to_url(&year);
            prop_assert_eq!(segment.len(), 4);
            prop_assert_eq!(YearConverter::to_value(&segment), Some(year));
        }

        #[test]
        fn prop_slug_segments_accepted(slug in "[a-zA-Z0-9_-]{1,40}") {
            prop_assert_eq!(SlugWithUnderscoreConverter::to_value(&slug), Some(slug.clone()));
        }
    }
}
