//! URL slugs for events.
//!
//! `slugify` keeps ASCII lower-case letters, digits and Hangul syllables;
//! every other run of characters collapses into one `-`. Collisions are
//! resolved by trying `base`, `base-1`, `base-2`, ... in order. Segments
//! that `/events/...` routes already use are never handed out.

/// Used when a title has no sluggable characters at all.
const FALLBACK_SLUG: &str = "event";

/// Static path segments under `/events`.
const RESERVED: &[&str] = &["new"];

fn is_reserved(slug: &str) -> bool {
    RESERVED.contains(&slug)
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if is_slug_char(c) {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// `base`, then `base-1`, `base-2`, ... without end, skipping reserved slugs.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string())
        .chain((1u64..).map(move |n| format!("{base}-{n}")))
        .filter(|candidate| !is_reserved(candidate))
}
