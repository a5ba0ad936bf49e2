//! Header table and MIME header grammar for batch parts.
//!
//! Lookup is case-insensitive, declaration order is preserved, and a header
//! may carry several values. Continuation lines (leading SP/TAB) are
//! unfolded onto the previous value per RFC 5322 folding rules.

use crate::error::BatchError;
use crate::lines::Line;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
pub const CONTENT_ID: &str = "Content-ID";
pub const ACCEPT: &str = "Accept";
pub const ACCEPT_LANGUAGE: &str = "Accept-Language";

pub const APPLICATION_HTTP: &str = "application/http";
pub const MULTIPART_MIXED: &str = "multipart/mixed";
pub const BINARY_ENCODING: &str = "binary";

#[derive(Debug, Clone)]
struct HeaderField {
    /// Name as first declared; lookups ignore case.
    name: String,
    values: Vec<String>,
}

/// Ordered, case-insensitive, multi-valued header table.
#[derive(Debug, Clone, Default)]
pub struct HeaderTable {
    fields: Vec<HeaderField>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Appends a value, merging into an existing field of the same name.
    pub fn add(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(index) => self.fields[index].values.push(value.to_string()),
            None => self.fields.push(HeaderField {
                name: name.to_string(),
                values: vec![value.to_string()],
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// First declared value, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.fields[i].values.first())
            .map(String::as_str)
    }

    pub fn values(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.fields[i].values,
            None => &[],
        }
    }

    /// All values of a field joined with ", ", the HTTP list form.
    pub fn joined(&self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.fields[i].values.join(", "))
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|i| self.fields.remove(i).values)
    }

    /// Fields in declaration order as (name, values) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parses consecutive `Name: value` lines into a table, stopping at the
/// first blank line. Returns the table and the index of the first line after
/// the blank separator (the body start).
pub fn parse_header_block(lines: &[Line]) -> Result<(HeaderTable, usize), BatchError> {
    let mut table = HeaderTable::new();
    let mut index = 0;

    while index < lines.len() {
        let line = &lines[index];
        if line.content().is_empty() {
            // Blank separator: body starts on the next line.
            return Ok((table, index + 1));
        }

        let text = line.content_str()?;
        if text.starts_with(' ') || text.starts_with('\t') {
            // Folded continuation of the previous value.
            let Some(field) = table.fields.last_mut() else {
                return Err(BatchError::invalid_mime_header(format!(
                    "continuation line without a preceding header: {text}"
                )));
            };
            let value = field
                .values
                .last_mut()
                .ok_or_else(|| BatchError::invalid_mime_header(text))?;
            value.push(' ');
            value.push_str(text.trim());
        } else {
            let Some((name, value)) = text.split_once(':') else {
                return Err(BatchError::invalid_mime_header(format!(
                    "malformed header line: {text}"
                )));
            };
            table.add(name.trim(), value.trim());
        }
        index += 1;
    }

    // No blank line: the whole range was headers, the body is empty.
    Ok((table, lines.len()))
}

/// Media type of a Content-Type value with parameters stripped, lowercased.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Validates the MIME headers of a leaf batch part: Content-Type must be
/// exactly application/http and Content-Transfer-Encoding must be binary.
pub fn validate_leaf_part_headers(table: &HeaderTable) -> Result<(), BatchError> {
    let content_type = table
        .first(CONTENT_TYPE)
        .ok_or_else(|| BatchError::InvalidContentType("<missing Content-Type>".to_string()))?;
    if media_type(content_type) != APPLICATION_HTTP {
        return Err(BatchError::InvalidContentType(content_type.to_string()));
    }

    let encoding = table.first(CONTENT_TRANSFER_ENCODING).ok_or_else(|| {
        BatchError::invalid_mime_header("missing Content-Transfer-Encoding header")
    })?;
    if !encoding.trim().eq_ignore_ascii_case(BINARY_ENCODING) {
        return Err(BatchError::invalid_mime_header(format!(
            "Content-Transfer-Encoding must be binary, got '{encoding}'"
        )));
    }

    Ok(())
}

/// Parses a declared Content-Length. The header must appear at most once;
/// the value must be an integer. Negative values are returned to the caller,
/// which decides per context whether they are fatal.
pub fn content_length(table: &HeaderTable) -> Result<Option<i64>, BatchError> {
    let values = table.values(CONTENT_LENGTH);
    match values {
        [] => Ok(None),
        [value] => {
            let parsed: i64 = value
                .trim()
                .parse()
                .map_err(|_| BatchError::invalid_content_length(value.clone()))?;
            Ok(Some(parsed))
        }
        _ => Err(BatchError::invalid_content_length(format!(
            "Content-Length declared {} times",
            values.len()
        ))),
    }
}
