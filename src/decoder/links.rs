//! Page-reference and fastext matching on decoded text runs
//!
//! A page reference is a standalone three digit page number, optionally
//! followed by `/` and a one or two digit subpage:
//!
//! ```text
//! (?<=\s|\d{3}[+-]|[^\d][.,]|^) \d{3}(/\d{1,2})? (?=\s|[+,-]\d{3}|$)
//! ```
//!
//! The `regex` crate has no lookaround, so the token itself is matched with
//! a regex anchored at each candidate position and both boundaries are
//! checked by hand against the surrounding characters.

use regex::Regex;
use std::ops::Range;

/// Page ranges that are recognized but never linked (broken and ticker pages)
pub const EXCLUDED_LINK_PREFIXES: &[&str] = &["147", "199"];

pub(crate) struct LinkMatcher {
    page_token: Regex,
    fastext: Regex,
}

impl LinkMatcher {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            page_token: Regex::new(r"^[0-9]{3}(?:/[0-9]{1,2})?")?,
            fastext: Regex::new(r"[^[:space:]]+.*")?,
        })
    }

    /// Finds every page reference in `line`, left to right, as byte ranges
    ///
    /// Excluded ranges are still reported; see [`is_excluded`].
    pub(crate) fn page_links(&self, line: &str) -> Vec<Range<usize>> {
        let chars: Vec<(usize, char)> = line.char_indices().collect();
        let byte_at = |idx: usize| chars.get(idx).map_or(line.len(), |&(b, _)| b);

        let mut found = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            if !preceded_by_boundary(&chars, i) {
                i += 1;
                continue;
            }

            let start = byte_at(i);
            let Some(token) = self.page_token.find(&line[start..]) else {
                i += 1;
                continue;
            };

            // The token is pure ASCII, so its byte length equals its char length
            let end = i + token.len();
            if followed_by_boundary(&chars, end) {
                found.push(start..byte_at(end));
                i = end;
            } else {
                i += 1;
            }
        }
        found
    }

    /// Finds the first non-blank run of a fastext row, extending to the end of the line
    pub(crate) fn fastext(&self, line: &str) -> Option<Range<usize>> {
        self.fastext.find(line).map(|m| m.range())
    }
}

/// Returns true for references in ranges that must not become links
pub fn is_excluded(token: &str) -> bool {
    EXCLUDED_LINK_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

fn all_digits(chars: &[(usize, char)]) -> bool {
    chars.iter().all(|&(_, c)| c.is_ascii_digit())
}

fn preceded_by_boundary(chars: &[(usize, char)], i: usize) -> bool {
    if i == 0 {
        return true;
    }

    let prev = chars[i - 1].1;
    if is_space(prev) {
        return true;
    }

    // Range like "100-105": the second number follows three digits and a sign
    if matches!(prev, '+' | '-') && i >= 4 && all_digits(&chars[i - 4..i - 1]) {
        return true;
    }

    // Punctuation right after a word: "zie.150", "nieuws,150"
    matches!(prev, '.' | ',') && i >= 2 && !chars[i - 2].1.is_ascii_digit()
}

fn followed_by_boundary(chars: &[(usize, char)], end: usize) -> bool {
    let Some(&(_, next)) = chars.get(end) else {
        return true;
    };

    if is_space(next) {
        return true;
    }

    matches!(next, '+' | ',' | '-')
        && chars.len() >= end + 4
        && all_digits(&chars[end + 1..end + 4])
}
