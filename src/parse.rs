//! Parsing for selection references given on the command line.
//!
//! A reference names a file and, optionally, which part of its diff to
//! take. Hunk indices and line offsets are the ones printed by
//! `git-partial diff`.
//!
//! # Syntax
//!
//! - `FILE` - the whole file
//! - `FILE:H,H..H` - whole hunks, as a comma-separated list of indices or
//!   inclusive ranges
//! - `FILE:H/N,N..M` - single lines of hunk `H`, by body offset
//!
//! # Examples
//!
//! ```
//! use git_partial::parse::{parse_ref, Selector};
//! use std::collections::BTreeSet;
//!
//! let whole = parse_ref("flake.nix").unwrap();
//! assert_eq!(whole.selector, Selector::WholeFile);
//!
//! let hunks = parse_ref("src/main.rs:0,2..3").unwrap();
//! assert_eq!(hunks.selector, Selector::Hunks(BTreeSet::from([0, 2, 3])));
//!
//! let lines = parse_ref("src/main.rs:1/4..5,8").unwrap();
//! assert_eq!(
//!     lines.selector,
//!     Selector::Lines { hunk: 1, offsets: BTreeSet::from([4, 5, 8]) }
//! );
//! ```

use error_set::error_set;
use std::collections::BTreeSet;

error_set! {
    /// Errors from parsing selection references
    RefParseError := {
        /// File name portion is empty or whitespace
        #[display("Invalid reference '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        /// Nothing after the colon
        #[display("Invalid reference '{input}': nothing selected after ':'")]
        EmptySelector { input: String },
        /// Nothing after the slash
        #[display("Invalid reference '{input}': no line offsets after '/'")]
        EmptyOffsets { input: String },
        /// Index or offset is not a non-negative integer
        #[display("Invalid number '{value}'")]
        InvalidNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: usize, end: usize },
    }
}

/// Which part of a file a reference selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    WholeFile,
    /// Whole hunks by index
    Hunks(BTreeSet<usize>),
    /// Change lines of one hunk by body offset
    Lines { hunk: usize, offsets: BTreeSet<usize> },
}

/// Parsed selection reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRef {
    pub file: String,
    pub selector: Selector,
}

/// Parse a `FILE[:SELECTOR]` reference.
///
/// The selector starts after the last `:`, but only when that text starts
/// with a digit or holds nothing but digits and selector punctuation. Otherwise the
/// whole input is the file name, so `dir:name.txt` names one file.
///
/// # Errors
///
/// Returns [`RefParseError`] if the file name is empty, the selector is
/// empty, or a number or range is invalid.
pub fn parse_ref(input: &str) -> Result<SelectionRef, RefParseError> {
    let split = input
        .rsplit_once(':')
        .filter(|(_, selector)| looks_like_selector(selector));
    let Some((file, selector)) = split else {
        return Ok(SelectionRef {
            file: file_name(input, input)?,
            selector: Selector::WholeFile,
        });
    };

    let file = file_name(file, input)?;
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(RefParseError::EmptySelector {
            input: input.to_string(),
        });
    }

    let selector = match selector.split_once('/') {
        Some((hunk, offsets)) => {
            let offsets = parse_list(offsets)?;
            if offsets.is_empty() {
                return Err(RefParseError::EmptyOffsets {
                    input: input.to_string(),
                });
            }
            Selector::Lines {
                hunk: parse_number(hunk.trim())?,
                offsets,
            }
        }
        None => {
            let hunks = parse_list(selector)?;
            if hunks.is_empty() {
                return Err(RefParseError::EmptySelector {
                    input: input.to_string(),
                });
            }
            Selector::Hunks(hunks)
        }
    };

    Ok(SelectionRef { file, selector })
}

fn looks_like_selector(text: &str) -> bool {
    text.trim_start().starts_with(|c: char| c.is_ascii_digit())
        || text
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, ',' | '.' | '/' | '-'))
}

fn file_name(file: &str, input: &str) -> Result<String, RefParseError> {
    let file = file.trim();
    if file.is_empty() {
        return Err(RefParseError::EmptyFileName {
            input: input.to_string(),
        });
    }
    Ok(file.to_string())
}

/// Parse a comma-separated list of numbers and inclusive ranges
/// Examples: "3", "0..2", "1,4..6"
fn parse_list(input: &str) -> Result<BTreeSet<usize>, RefParseError> {
    let mut numbers = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once("..") {
            Some((start, end)) => {
                let start = parse_number(start)?;
                let end = parse_number(end)?;
                if start > end {
                    return Err(RefParseError::InvalidRange { start, end });
                }
                numbers.extend(start..=end);
            }
            None => {
                numbers.insert(parse_number(part)?);
            }
        }
    }
    Ok(numbers)
}

fn parse_number(input: &str) -> Result<usize, RefParseError> {
    input
        .parse::<usize>()
        .map_err(|_| RefParseError::InvalidNumber {
            value: input.to_string(),
        })
}
