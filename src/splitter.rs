//! RFC 2046 part splitting for $batch envelopes.
//!
//! Given a boundary token and the terminator-preserving line sequence, this
//! module cuts the payload into parts (the line ranges between delimiter
//! lines), discarding the preamble before the first delimiter and the
//! epilogue after the close delimiter. Boundary text that appears inside a
//! body without the leading `--` is never treated as a delimiter because
//! matching happens per line, not per byte window.

use crate::error::BatchError;
use crate::lines::Line;
use log::debug;

/// RFC 2046 boundary length limit.
const MAX_BOUNDARY_LENGTH: usize = 70;

/// Extracts and validates the boundary parameter of a multipart/mixed
/// Content-Type value. The boundary may be quoted (permitting spaces and
/// punctuation) or bare.
pub fn extract_boundary(content_type: &str) -> Result<String, BatchError> {
    let mut segments = content_type.split(';');
    let media_type = segments.next().unwrap_or("").trim();
    if !media_type.eq_ignore_ascii_case("multipart/mixed") {
        return Err(BatchError::InvalidContentType(content_type.to_string()));
    }

    for segment in segments {
        let segment = segment.trim();
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("boundary") {
            continue;
        }
        let value = value.trim();
        let (boundary, quoted) = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
        {
            (&value[1..value.len() - 1], true)
        } else {
            (value, false)
        };
        validate_boundary(boundary, quoted)
            .map_err(|_| BatchError::NoBoundaryFound(content_type.to_string()))?;
        return Ok(boundary.to_string());
    }

    Err(BatchError::NoBoundaryFound(content_type.to_string()))
}

/// Validates a boundary token against the RFC 2046 character set. Spaces are
/// only legal in the quoted form and never at the end.
pub fn validate_boundary(boundary: &str, quoted: bool) -> Result<(), BatchError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LENGTH {
        return Err(BatchError::NoBoundaryFound(boundary.to_string()));
    }
    if boundary.ends_with(' ') {
        return Err(BatchError::NoBoundaryFound(boundary.to_string()));
    }
    let bchars_ok = boundary.chars().all(|c| {
        c.is_ascii_alphanumeric() || "'()+_,-./:=?".contains(c) || (quoted && c == ' ')
    });
    if !bchars_ok {
        return Err(BatchError::NoBoundaryFound(boundary.to_string()));
    }
    Ok(())
}

enum DelimiterKind {
    Open,
    Close,
    NotADelimiter,
}

fn classify_delimiter(line: &Line, boundary: &str) -> DelimiterKind {
    // Terminator bytes are already excluded from content; transport padding
    // (trailing SP/TAB) is ignored per RFC 2046 §5.1.1.
    let content = line.content();
    let mut end = content.len();
    while end > 0 && (content[end - 1] == b' ' || content[end - 1] == b'\t') {
        end -= 1;
    }
    let content = &content[..end];

    if content.len() < 2 + boundary.len() || &content[..2] != b"--" {
        return DelimiterKind::NotADelimiter;
    }
    if &content[2..2 + boundary.len()] != boundary.as_bytes() {
        return DelimiterKind::NotADelimiter;
    }
    match &content[2 + boundary.len()..] {
        b"" => DelimiterKind::Open,
        b"--" => DelimiterKind::Close,
        _ => DelimiterKind::NotADelimiter,
    }
}

/// Partitions `lines` into the ordered parts delimited by `--boundary`
/// lines. The close delimiter `--boundary--` is mandatory; a stream that
/// ends inside a part is a fatal error.
pub fn split_parts(lines: &[Line], boundary: &str) -> Result<Vec<Vec<Line>>, BatchError> {
    let mut parts: Vec<Vec<Line>> = Vec::new();
    let mut current: Option<Vec<Line>> = None;
    let mut preamble_lines = 0usize;

    for (index, line) in lines.iter().enumerate() {
        match classify_delimiter(line, boundary) {
            DelimiterKind::Open => {
                if let Some(part) = current.take() {
                    parts.push(part);
                }
                current = Some(Vec::new());
            }
            DelimiterKind::Close => {
                let Some(part) = current.take() else {
                    // Close before any open delimiter: nothing was framed.
                    return Err(BatchError::MissingCloseDelimiter);
                };
                parts.push(part);
                let epilogue = lines.len() - index - 1;
                if preamble_lines > 0 || epilogue > 0 {
                    debug!(
                        "discarded {preamble_lines} preamble and {epilogue} epilogue line(s)"
                    );
                }
                return Ok(parts);
            }
            DelimiterKind::NotADelimiter => match current {
                Some(ref mut part) => part.push(line.clone()),
                None => preamble_lines += 1,
            },
        }
    }

    Err(BatchError::MissingCloseDelimiter)
}

/// Truncates `lines` so the total raw byte count (content plus terminators)
/// is at most `length`, splitting the last retained line if the cut falls
/// inside it. A `length` larger than the available bytes is a no-op.
pub fn trim_lines_to_length(lines: &[Line], length: usize) -> Vec<Line> {
    let mut trimmed = Vec::new();
    let mut remaining = length;

    for line in lines {
        if remaining == 0 {
            break;
        }
        let raw_len = line.raw_len();
        if raw_len <= remaining {
            trimmed.push(line.clone());
            remaining -= raw_len;
        } else {
            let mut raw = line.raw();
            raw.truncate(remaining);
            trimmed.push(Line::from_raw(raw));
            break;
        }
    }

    trimmed
}

/// Strips the terminator of the final line. Bodies exclude the terminator
/// owned by the following delimiter line, but keep every terminator that is
/// part of the payload itself.
pub fn remove_ending_crlf(lines: &mut Vec<Line>) {
    if let Some(last) = lines.last_mut() {
        *last = last.without_terminator();
    }
}

/// Concatenates the raw bytes of a line range.
pub fn concat_raw(lines: &[Line]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(lines.iter().map(Line::raw_len).sum());
    for line in lines {
        bytes.extend_from_slice(&line.raw());
    }
    bytes
}
