//! Two-tier comparison of generated text against what is already on disk

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a write-back decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Existing content is equivalent; nothing was written
    Unchanged,
    /// Destination was (or, for a dry run, would be) overwritten
    Changed,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        matches!(self, Outcome::Changed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unchanged => write!(f, "unchanged"),
            Outcome::Changed => write!(f, "changed"),
        }
    }
}

/// Which comparison tier settled the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// No file at the destination
    Missing,
    /// Byte-for-byte identical
    Identical,
    /// Equal once every whitespace character and any leading byte-order mark
    /// are removed
    WhitespaceEquivalent,
    Different,
}

impl Comparison {
    /// Compare existing file bytes (if any) with freshly generated text.
    pub fn of(existing: Option<&[u8]>, generated: &str) -> Self {
        let Some(existing) = existing else {
            return Comparison::Missing;
        };

        if existing == generated.as_bytes() {
            return Comparison::Identical;
        }

        // Undecodable bytes become U+FFFD and take part in the comparison.
        let existing = String::from_utf8_lossy(existing);
        if equal_ignoring_whitespace(strip_bom(&existing), strip_bom(generated)) {
            Comparison::WhitespaceEquivalent
        } else {
            Comparison::Different
        }
    }

    pub fn outcome(self) -> Outcome {
        match self {
            Comparison::Identical | Comparison::WhitespaceEquivalent => Outcome::Unchanged,
            Comparison::Missing | Comparison::Different => Outcome::Changed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Missing => "missing",
            Comparison::Identical => "identical",
            Comparison::WhitespaceEquivalent => "whitespace_equivalent",
            Comparison::Different => "different",
        }
    }
}

/// True when `a` and `b` match after removing all whitespace characters.
///
/// Whitespace is removed, not collapsed: `"a b"` equals `"ab"`. This also
/// treats spacing inside string literals as insignificant.
pub fn equal_ignoring_whitespace(a: &str, b: &str) -> bool {
    non_whitespace(a).eq(non_whitespace(b))
}

fn non_whitespace(s: &str) -> impl Iterator<Item = char> + '_ {
    s.chars().filter(|c| !c.is_whitespace())
}

/// Editors commonly save a UTF-8 byte-order mark; it is not part of the text.
fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{FEFF}').unwrap_or(s)
}
