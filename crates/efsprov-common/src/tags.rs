//! Parsing of operator-supplied tag strings.
//!
//! The format is a space-separated list of `key:value` pairs. Single quotes
//! make spaces and colons literal:
//!
//! ```text
//! team:storage owner:'Jane Doe' url:'http://example.com'
//! ```
//!
//! Tags are static operator configuration, so a malformed pair only drops
//! that pair. [`parse_tags`] never fails.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Key/value tags applied to created resources.
pub type Tags = HashMap<String, String>;

/// Why a single pair was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
enum TagError {
    #[error("unmatched quotes in tag string")]
    UnmatchedQuote,
    #[error("cannot have empty key")]
    EmptyKey,
    #[error("missing ':' between key and value")]
    MissingSeparator,
}

/// Parse a tag string into a map.
///
/// Pairs that cannot be parsed are logged and skipped. Duplicate keys keep
/// the last value.
#[must_use]
pub fn parse_tags(raw: &str) -> Tags {
    let mut tags = Tags::new();
    if raw.is_empty() {
        tracing::info!("Did not find any input tags");
        return tags;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| parse_into(raw, &mut tags)));
    if outcome.is_err() {
        tracing::error!(raw, parsed = tags.len(), "Failed to parse input tag string");
    }
    tags
}

fn parse_into(raw: &str, tags: &mut Tags) {
    for pair in split_pairs(raw) {
        match split_pair(&pair) {
            Ok((key, value)) => {
                tags.insert(key, value);
            }
            Err(e) => {
                tracing::warn!(pair = %pair, error = %e, "Could not extract key and value");
            }
        }
    }
}

/// Split on unquoted spaces. Quotes stay in the tokens.
fn split_pairs(raw: &str) -> Vec<String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut literal = false;

    for c in raw.chars() {
        match c {
            '\'' => {
                literal = !literal;
                current.push(c);
            }
            ' ' if !literal => {
                if !current.is_empty() {
                    pairs.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        pairs.push(current);
    }
    pairs
}

/// Split one token at its first unquoted colon.
fn split_pair(pair: &str) -> Result<(String, String), TagError> {
    if pair.chars().filter(|&c| c == '\'').count() % 2 != 0 {
        return Err(TagError::UnmatchedQuote);
    }

    let mut key = String::new();
    let mut literal = false;
    let mut separator = None;
    for (idx, c) in pair.char_indices() {
        match c {
            '\'' => literal = !literal,
            ':' if !literal => {
                separator = Some(idx);
                break;
            }
            _ => key.push(c),
        }
    }

    let idx = separator.ok_or(TagError::MissingSeparator)?;
    if key.is_empty() {
        return Err(TagError::EmptyKey);
    }

    let value = &pair[idx + 1..];
    let value = value.strip_prefix('\'').unwrap_or(value);
    let value = value.strip_suffix('\'').unwrap_or(value);
    Ok((key, value.to_string()))
}
