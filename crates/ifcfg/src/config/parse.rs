//! Reader for existing ifcfg files.
//!
//! Files are shell fragments, but only the subset ifcfg tooling reads is
//! accepted: one `KEY=value` assignment per line, `#` comments and blank
//! lines. Values may be bare, single-quoted or double-quoted (with `\`
//! escapes), and adjacent segments concatenate as in the shell.

use std::collections::BTreeMap;
use std::path::Path;

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, take_till, take_while};

use super::render::HEADER;
use crate::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Error for a single malformed line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    /// What is wrong.
    pub message: String,
}

/// Parsed contents of an ifcfg file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfcfgFile {
    entries: Vec<(String, String)>,
    managed: bool,
}

impl IfcfgFile {
    /// Parse file content.
    pub fn parse(content: &str) -> std::result::Result<Self, ParseError> {
        let mut entries = Vec::new();
        let managed = content.lines().next().map(str::trim_end) == Some(HEADER);

        for (idx, raw) in content.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut input = trimmed;
            match assignment(&mut input) {
                Ok(entry) => entries.push(entry),
                Err(_) => {
                    return Err(ParseError {
                        line: idx + 1,
                        message: format!("expected KEY=value, got '{}'", trimmed),
                    });
                }
            }
        }

        Ok(Self { entries, managed })
    }

    /// Read and parse a file.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        Self::parse(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })
    }

    /// Read a file if it exists.
    pub fn read_optional(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map(Some).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                line: e.line,
                message: e.message,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::file(path, e)),
        }
    }

    /// Get a value. When a key repeats, the last assignment wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get all assignments in file order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Get the effective value of every key.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().cloned().collect()
    }

    /// Check if the file was written by this crate.
    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Number of assignments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the file has no assignments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}

fn blank<'a>(input: &mut &'a str) -> PResult<&'a str> {
    take_while(0.., |c: char| c == ' ' || c == '\t').parse_next(input)
}

fn key<'a>(input: &mut &'a str) -> PResult<&'a str> {
    let k: &str = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)?;
    if k.starts_with(|c: char| c.is_ascii_digit()) {
        return cut();
    }
    Ok(k)
}

fn double_quoted(input: &mut &str) -> PResult<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => return Ok(out),
            '\\' => {
                let next = any.parse_next(input)?;
                // Inside double quotes the backslash only escapes these.
                if !matches!(next, '\\' | '"' | '$' | '`') {
                    out.push('\\');
                }
                out.push(next);
            }
            c => out.push(c),
        }
    }
}

fn single_quoted(input: &mut &str) -> PResult<String> {
    '\''.parse_next(input)?;
    let s: &str = take_till(0.., '\'').parse_next(input)?;
    '\''.parse_next(input)?;
    Ok(s.to_string())
}

/// Unquoted run. `#` inside a word is literal; only whitespace ends it.
fn bare(input: &mut &str) -> PResult<String> {
    let s: &str = take_till(1.., |c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '\\')
    })
    .parse_next(input)?;
    Ok(s.to_string())
}

fn escaped(input: &mut &str) -> PResult<String> {
    '\\'.parse_next(input)?;
    let c = any.parse_next(input)?;
    Ok(c.to_string())
}

fn value(input: &mut &str) -> PResult<String> {
    let mut out = String::new();
    loop {
        let segment = match input.chars().next() {
            Some('"') => double_quoted(input)?,
            Some('\'') => single_quoted(input)?,
            Some('\\') => escaped(input)?,
            Some(c) if !c.is_whitespace() => bare(input)?,
            _ => return Ok(out),
        };
        out.push_str(&segment);
    }
}

fn assignment(input: &mut &str) -> PResult<(String, String)> {
    blank(input)?;
    let k = key(input)?;
    '='.parse_next(input)?;
    let v = value(input)?;
    blank(input)?;
    if !input.is_empty() && !input.starts_with('#') {
        return cut();
    }
    Ok((k.to_string(), v))
}
