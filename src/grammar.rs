//! Embedded pseudo-HTTP request-line and status-line grammar.
//!
//! Each leaf part of a batch carries one `METHOD target HTTP/1.1` line (or
//! `HTTP/1.1 code reason` on the response side). Strict mode requires the
//! exact grammar with single-space separators; lenient mode tolerates runs
//! of spaces and tabs between the tokens.

use crate::error::BatchError;
use crate::lines::Line;
use std::fmt;

const HTTP_VERSION: &str = "HTTP/1.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Merge,
    Patch,
}

impl Method {
    pub fn parse(token: &str) -> Option<Method> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "MERGE" => Some(Method::Merge),
            "PATCH" => Some(Method::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Merge => "MERGE",
            Method::Patch => "PATCH",
        }
    }

    /// Changesets apply atomically, so only mutating verbs are legal inside
    /// one.
    pub fn is_allowed_in_changeset(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn tokenize(text: &str, strict: bool) -> Option<Vec<&str>> {
    if strict {
        // Exactly single-SP separators, no leading or trailing whitespace.
        if text.starts_with(' ') || text.ends_with(' ') || text.contains("  ") {
            return None;
        }
        if text.contains('\t') {
            return None;
        }
        Some(text.split(' ').collect())
    } else {
        Some(text.split_ascii_whitespace().collect())
    }
}

/// Parses `METHOD request-target HTTP/1.1`. The line must end in a real
/// terminator; an unterminated request line means the part was truncated.
pub fn parse_request_line(line: &Line, strict: bool) -> Result<(Method, String), BatchError> {
    let text = line
        .content_str()
        .map_err(|_| BatchError::invalid_request_line(String::from_utf8_lossy(line.content())))?;

    if line.terminator().is_none() {
        return Err(BatchError::invalid_request_line(text));
    }

    let tokens = tokenize(text, strict).ok_or_else(|| BatchError::invalid_request_line(text))?;
    let [method, target, version] = tokens.as_slice() else {
        return Err(BatchError::invalid_request_line(text));
    };

    if *version != HTTP_VERSION {
        return Err(BatchError::invalid_request_line(text));
    }
    let method =
        Method::parse(method).ok_or_else(|| BatchError::invalid_request_line(text))?;
    if target.is_empty() {
        return Err(BatchError::invalid_request_line(text));
    }

    Ok((method, (*target).to_string()))
}

/// Parses `HTTP/1.1 status-code reason-phrase`. The reason phrase may
/// contain spaces and may be empty.
pub fn parse_status_line(line: &Line) -> Result<(u16, String), BatchError> {
    let text = line
        .content_str()
        .map_err(|_| BatchError::invalid_status_line(String::from_utf8_lossy(line.content())))?;

    let rest = text
        .strip_prefix(HTTP_VERSION)
        .ok_or_else(|| BatchError::invalid_status_line(text))?;
    let rest = rest
        .strip_prefix(' ')
        .ok_or_else(|| BatchError::invalid_status_line(text))?;

    let (code_token, reason) = match rest.split_once(' ') {
        Some((code, reason)) => (code, reason),
        None => (rest, ""),
    };

    let code: u16 = code_token
        .parse()
        .map_err(|_| BatchError::invalid_status_line(text))?;
    if !(100..=599).contains(&code) {
        return Err(BatchError::invalid_status_line(text));
    }

    let reason = if reason.is_empty() {
        reason_phrase(code).to_string()
    } else {
        reason.to_string()
    };

    Ok((code, reason))
}

/// Canonical reason phrase for a status code; empty for codes without a
/// registered phrase.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        409 => "Conflict",
        412 => "Precondition Failed",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "",
    }
}
