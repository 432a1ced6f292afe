//! # Property Files
//!
//! Java-style property files, the format of every store the node agent
//! reads and of its legacy configuration file. Files are ISO-8859-1;
//! anything outside that range is written as a `\uXXXX` escape.
//!
//! | Line | Meaning |
//! |------|---------|
//! | `key=value`, `key: value`, `key value` | entry; the first unescaped `=`, `:` or blank ends the key |
//! | `key` | entry with an empty value |
//! | `# ...` / `! ...` | comment |
//! | blank | ignored |
//! | ending in an odd number of `\` | continued on the next line, whose leading blanks are dropped |
//!
//! Escapes `\t`, `\n`, `\r`, `\f` and `\uXXXX` are decoded in keys and
//! values; a backslash before any other character keeps that character, so
//! `a\=b` is a key containing `=`. Leading blanks of keys and values are
//! skipped, trailing ones are kept. A later duplicate replaces an earlier
//! one, and entries with an empty key are dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::Chars;

use encoding_rs::WINDOWS_1252;

use crate::error::{Result, StoreError};

/// Parsed property file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    entries: BTreeMap<String, String>,
}

impl PropertyMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses property text.
    pub fn parse(text: &str) -> Self {
        let entries = logical_lines(text)
            .iter()
            .map(|line| split_entry(line))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    /// Parses the raw bytes of a property file.
    pub fn from_latin1(bytes: &[u8]) -> Self {
        let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
        Self::parse(&text)
    }

    /// Reads and parses a property file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] naming the path if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_latin1(&bytes))
    }

    /// Value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the map, returning the underlying entries.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl FromIterator<(String, String)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

/// Joins continued lines and drops blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for natural in text.lines() {
        let trimmed = natural.trim_start_matches(is_blank);
        let mut line = match pending.take() {
            Some(mut joined) => {
                joined.push_str(trimmed);
                joined
            }
            None if trimmed.is_empty() || trimmed.starts_with(['#', '!']) => continue,
            None => trimmed.to_string(),
        };

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            line.pop();
            pending = Some(line);
        } else {
            lines.push(line);
        }
    }
    lines.extend(pending);
    lines
}

fn split_entry(line: &str) -> (String, String) {
    let mut chars = line.chars();
    let mut key = String::new();
    let mut separated = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => unescape_next(&mut chars, &mut key),
            '=' | ':' => {
                separated = true;
                break;
            }
            c if is_blank(c) => break,
            c => key.push(c),
        }
    }

    let mut rest = chars.as_str().trim_start_matches(is_blank);
    if !separated {
        if let Some(after) = rest.strip_prefix(['=', ':']) {
            rest = after.trim_start_matches(is_blank);
        }
    }
    (key, unescape(rest))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            unescape_next(&mut chars, &mut out);
        } else {
            out.push(c);
        }
    }
    out
}

/// Decodes the escape whose backslash was just consumed.
fn unescape_next(chars: &mut Chars<'_>, out: &mut String) {
    let Some(c) = chars.next() else {
        return;
    };
    match c {
        't' => out.push('\t'),
        'n' => out.push('\n'),
        'r' => out.push('\r'),
        'f' => out.push('\u{c}'),
        'u' => {
            let digits = chars.as_str().get(..4).filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()));
            match digits
                .and_then(|d| u32::from_str_radix(d, 16).ok())
                .and_then(char::from_u32)
            {
                Some(decoded) => {
                    out.push(decoded);
                    *chars = chars.as_str()[4..].chars();
                }
                // Malformed escape: keep it as written.
                None => out.push('u'),
            }
        }
        other => out.push(other),
    }
}
