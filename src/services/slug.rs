//! Slug generation
//!
//! `slugify` turns arbitrary text into a URL segment. `slug_candidates`
//! produces the sequence tried when a slug is already taken: the base
//! itself, then `base-2`, `base-3`, and so on, every candidate cut to fit
//! the column width without losing its numeric suffix.

use crate::models::POST_SLUG_MAX_LEN;

/// Maximum slug length, shared by posts and groups
pub const SLUG_MAX_LEN: usize = POST_SLUG_MAX_LEN;

/// Lowercase `text` and reduce it to a slug.
///
/// Letters and digits (including non-ASCII ones) and `_` are kept, runs of
/// whitespace and `-` become a single `-`, everything else is dropped.
/// Leading and trailing `-`/`_` are trimmed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Slug derived from a title, cut to `SLUG_MAX_LEN` characters.
///
/// Titles that slugify to nothing use `fallback`.
pub fn base_slug(title: &str, fallback: &str) -> String {
    let slugged = slugify(title);
    let slug = truncate_chars(&slugged, SLUG_MAX_LEN).trim_end_matches('-');
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

/// `base-n`, with `base` shortened so the whole slug fits `SLUG_MAX_LEN`
pub fn numbered_slug(base: &str, n: u32) -> String {
    let suffix = format!("-{}", n);
    let room = SLUG_MAX_LEN.saturating_sub(suffix.chars().count());
    let head = truncate_chars(base, room);
    format!("{}{}", head.trim_end_matches('-'), suffix)
}

/// Candidates in the order they are tried: `base`, `base-2`, `base-3`, ...
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(truncate_chars(base, SLUG_MAX_LEN).to_string())
        .chain((2..).map(move |n| numbered_slug(base, n)))
}

/// Whether an explicitly supplied slug can be stored as-is
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().count() <= SLUG_MAX_LEN && slugify(slug) == slug
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
