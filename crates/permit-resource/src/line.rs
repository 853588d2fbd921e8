//! Candidate lines and their newline-delimited encoding.
//!
//! Lines are read as bytes. A line that is valid UTF-8 becomes
//! [`Line::Text`] and is matched against the predicate; anything else is
//! kept as [`Line::Raw`], never matches, and is written back byte-for-byte.

use crate::predicate::is_target;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate line, without its terminator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Line {
    Text(String),
    Raw(Vec<u8>),
}

impl Line {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Line::Text(text),
            Err(e) => Line::Raw(e.into_bytes()),
        }
    }

    /// The line as text, `None` if it is not UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Line::Text(text) => Some(text),
            Line::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Line::Text(text) => text.as_bytes(),
            Line::Raw(bytes) => bytes,
        }
    }

    /// Whether the line is a claimable palindrome. Raw lines never are.
    pub fn is_target(&self) -> bool {
        self.as_text().is_some_and(is_target)
    }
}

impl From<String> for Line {
    fn from(text: String) -> Self {
        Line::Text(text)
    }
}

impl From<&str> for Line {
    fn from(text: &str) -> Self {
        Line::Text(text.to_string())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Text(text) => f.write_str(text),
            Line::Raw(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

impl PartialEq<str> for Line {
    fn eq(&self, other: &str) -> bool {
        self.as_text() == Some(other)
    }
}

impl PartialEq<&str> for Line {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

impl PartialEq<String> for Line {
    fn eq(&self, other: &String) -> bool {
        self.as_text() == Some(other.as_str())
    }
}

/// Split newline-delimited bytes into lines. A trailing `\r` is dropped from
/// every line and a final terminator does not start an extra empty line.
pub fn parse_lines(bytes: &[u8]) -> Vec<Line> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    body.split(|&b| b == b'\n')
        .map(|line| Line::from_bytes(line.strip_suffix(b"\r").unwrap_or(line).to_vec()))
        .collect()
}

/// Encode lines in order, each followed by `\n`.
pub fn render_lines(lines: &[Line]) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines.iter().map(|l| l.as_bytes().len() + 1).sum());
    for line in lines {
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}
