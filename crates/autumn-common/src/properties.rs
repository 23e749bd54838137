//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Key/value bundle format used by configuration sources."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised while parsing a properties document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PropertiesError {
    /// A `\uXXXX` escape was truncated, not hexadecimal, or not a valid code point.
    #[error("malformed \\uXXXX escape on line {line}")]
    MalformedEscape { line: usize },
}

/// Ordered key/value mapping materialized from a configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: IndexMap<String, String>,
}

impl Properties {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a properties document.
    ///
    /// Supports `=`, `:` and whitespace separators, `#`/`!` comment lines,
    /// backslash line continuations and the usual escape sequences.
    /// When a key repeats, the last occurrence wins.
    pub fn parse(text: &str) -> Result<Self, PropertiesError> {
        let mut properties = Self::new();
        let mut lines = text.lines().enumerate();

        while let Some((index, raw)) = lines.next() {
            let line = raw.trim_start_matches(is_blank);
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let mut logical = line.to_owned();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            let line_number = index + 1;
            properties.insert(unescape(key, line_number)?, unescape(value, line_number)?);
        }

        Ok(properties)
    }

    /// Look up the value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every entry of `other` whose key is absent here. Existing keys are
    /// never overwritten. Returns the number of entries copied.
    pub fn merge_absent(&mut self, other: &Properties) -> usize {
        let mut added = 0;
        for (key, value) in other.iter() {
            if !self.entries.contains_key(key) {
                self.entries.insert(key.to_owned(), value.to_owned());
                added += 1;
            }
        }
        added
    }
}

impl FromStr for Properties {
    type Err = PropertiesError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::parse(content)
    }
}

impl<K, V> FromIterator<(K, V)> for Properties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (key, value) in iter {
            properties.insert(key, value);
        }
        properties
    }
}

/// Decode raw bundle bytes as UTF-8, falling back to ISO-8859-1 so a stray
/// Latin-1 byte never discards the rest of the document.
pub fn decode_bundle(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&byte| char::from(byte)).collect(),
    }
}

fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\u{c}')
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|ch| *ch == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => {
                let value = line[idx + ch.len_utf8()..].trim_start_matches(is_blank);
                return (&line[..idx], value);
            }
            ch if is_blank(ch) => {
                let rest = line[idx..].trim_start_matches(is_blank);
                let rest = rest
                    .strip_prefix(|sep: char| sep == '=' || sep == ':')
                    .unwrap_or(rest);
                return (&line[..idx], rest.trim_start_matches(is_blank));
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str, line: usize) -> Result<String, PropertiesError> {
    let mut out = String::with_capacity(raw.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            flush_units(&mut units, &mut out, line)?;
            out.push(ch);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        if escaped == 'u' {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.chars().count() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PropertiesError::MalformedEscape { line });
            }
            let unit = u16::from_str_radix(&hex, 16)
                .map_err(|_| PropertiesError::MalformedEscape { line })?;
            units.push(unit);
            continue;
        }
        flush_units(&mut units, &mut out, line)?;
        out.push(match escaped {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'f' => '\u{c}',
            other => other,
        });
    }
    flush_units(&mut units, &mut out, line)?;
    Ok(out)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String, line: usize) -> Result<(), PropertiesError> {
    if units.is_empty() {
        return Ok(());
    }
    for decoded in char::decode_utf16(units.drain(..)) {
        out.push(decoded.map_err(|_| PropertiesError::MalformedEscape { line })?);
    }
    Ok(())
}
