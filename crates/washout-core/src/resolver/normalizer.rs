//! Drug name canonicalization.
//!
//! Handles:
//! - Whitespace removal (ASCII and ideographic)
//! - Stripping of 「…」 qualifier segments
//! - Full-width digit folding (０-９ → 0-9)
//! - Lowercasing

/// Opening bracket of a qualifier segment.
const QUALIFIER_OPEN: char = '「';
/// Closing bracket of a qualifier segment.
const QUALIFIER_CLOSE: char = '」';

/// Code point distance between a full-width digit and its ASCII form.
const FULLWIDTH_OFFSET: u32 = 0xFEE0;

/// Canonical comparison key for a drug name.
///
/// Total and idempotent: `normalize(&normalize(s)) == normalize(s)` for every `s`.
pub fn normalize(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !is_blank(*c)).collect();
    let stripped = strip_qualifiers(&compact);
    let folded: String = stripped.chars().map(fold_fullwidth_digit).collect();
    folded.to_lowercase()
}

/// Like [`normalize`], but absent names map to the empty key.
pub fn normalize_opt(raw: Option<&str>) -> String {
    raw.map(normalize).unwrap_or_default()
}

/// Unicode `White_Space` plus the BOM. This includes U+0085 (NEL), which a
/// JavaScript `\s` class would keep.
fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Remove every `「…」` segment, brackets included, closing at the nearest `」`.
/// An opening bracket with no closing bracket after it is kept as-is.
fn strip_qualifiers(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(open) = rest.find(QUALIFIER_OPEN) {
        let after_open = &rest[open + QUALIFIER_OPEN.len_utf8()..];
        match after_open.find(QUALIFIER_CLOSE) {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &after_open[close + QUALIFIER_CLOSE.len_utf8()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

fn fold_fullwidth_digit(c: char) -> char {
    if ('０'..='９').contains(&c) {
        char::from_u32(c as u32 - FULLWIDTH_OFFSET).unwrap_or(c)
    } else {
        c
    }
}
