use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Fallback anchor for headings whose text slugifies to nothing.
pub const EMPTY_ANCHOR: &str = "heading";

/// Turn heading text into a bookmark anchor.
///
/// 1. Decompose (NFKD) and drop combining marks, so accents disappear
/// 2. Lowercase
/// 3. Drop everything except word characters, whitespace and hyphens
/// 4. Trim, then replace each whitespace run with a single hyphen
///
/// The result is a pure function of the text; an empty result falls back to
/// [`EMPTY_ANCHOR`].
pub fn anchor(text: &str) -> String {
    let mut kept = String::with_capacity(text.len());
    for ch in text.nfkd().filter(|ch| !is_combining_mark(*ch)) {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' || ch.is_whitespace() {
            kept.extend(ch.to_lowercase());
        }
    }

    let mut slug = String::with_capacity(kept.len());
    let mut in_space = false;
    for ch in kept.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.push(ch);
            in_space = false;
        }
    }

    if slug.is_empty() {
        slug.push_str(EMPTY_ANCHOR);
    }
    slug
}
