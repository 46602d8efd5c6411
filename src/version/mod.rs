//! Version arithmetic, tag ordering and version-file bumping.
//!
//! Versions here are loose dotted strings as written by package authors, not
//! semantic versions. The only arithmetic performed is "last dot-component + 1".

mod bumper;

pub use bumper::{BumpReport, bump_versions, substitute_version};

use crate::error::{Result, VersionError};
use std::cmp::Ordering;

/// Compute the successor of `version` by incrementing its last dot-component
///
/// No carrying into higher components: `1.9` becomes `1.10`.
pub fn next_minor_version(version: &str) -> Result<String> {
    let version = version.trim();
    let (head, last) = match version.rsplit_once('.') {
        Some((head, last)) => (Some(head), last),
        None => (None, version),
    };

    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidVersionFormat {
            version: version.to_string(),
            reason: format!("last component '{}' is not an integer", last),
        }
        .into());
    }
    let counter: u64 = last.parse().map_err(|_| VersionError::InvalidVersionFormat {
        version: version.to_string(),
        reason: format!("last component '{}' is out of range", last),
    })?;

    let next = counter + 1;
    Ok(match head {
        Some(head) => format!("{}.{}", head, next),
        None => next.to_string(),
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Number(u64),
    Word(&'a str),
}

impl Ord for Token<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Token::Number(a), Token::Number(b)) => a.cmp(b),
            (Token::Number(_), Token::Word(_)) => Ordering::Less,
            (Token::Word(_), Token::Number(_)) => Ordering::Greater,
            (Token::Word(a), Token::Word(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Token<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split into runs of digits and runs of letters; separators are dropped
fn tokenize(version: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = version.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let b = bytes[start];
        if !b.is_ascii_alphanumeric() {
            start += 1;
            continue;
        }
        let digit = b.is_ascii_digit();
        let mut end = start;
        while end < bytes.len()
            && bytes[end].is_ascii_alphanumeric()
            && bytes[end].is_ascii_digit() == digit
        {
            end += 1;
        }
        let run = &version[start..end];
        tokens.push(match run.parse::<u64>() {
            Ok(n) if digit => Token::Number(n),
            _ => Token::Word(run),
        });
        start = end;
    }
    tokens
}

/// Total order over loose version strings
///
/// Numeric runs compare numerically, letter runs lexicographically, numbers
/// sort before letters and a shorter prefix sorts first. Ties fall back to
/// plain string order so distinct tags never compare equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    tokenize(a).cmp(&tokenize(b)).then_with(|| a.cmp(b))
}

/// A tag identifier ordered by [`compare_versions`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    /// Wrap a backend tag identifier
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag identifier as reported by the backend
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.0, &other.0)
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort tag identifiers ascending and drop duplicates
pub fn sort_tags<I, S>(tags: I) -> Vec<VersionTag>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut sorted: Vec<VersionTag> = tags
        .into_iter()
        .map(Into::into)
        .filter(|t: &String| !t.trim().is_empty())
        .map(|t| VersionTag::new(t.trim()))
        .collect();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Newest tag, or `None` when nothing has been tagged yet
pub fn latest_tag(sorted: &[VersionTag]) -> Option<&VersionTag> {
    sorted.last()
}
