//! Response-side decoding of a $batch payload.
//!
//! The response envelope mirrors the request envelope with status lines in
//! place of request lines. Changeset envelopes are walked one level deep and
//! their member responses appear in the flat result list; the echoed
//! Content-ID ties each one back to its originating request.

use crate::error::BatchError;
use crate::grammar::parse_status_line;
use crate::headers::{self, CONTENT_ID, HeaderTable, MULTIPART_MIXED, parse_header_block};
use crate::lines::{Line, LineReader};
use crate::request::extract_body;
use crate::splitter::{extract_boundary, split_parts};
use log::debug;
use std::io::Read;

/// One logical response decoded from a batch response payload.
#[derive(Debug, Clone)]
pub struct BatchSingleResponse {
    pub status_code: u16,
    pub status_reason: String,
    /// The embedded HTTP headers, order-preserving.
    pub headers: HeaderTable,
    /// Echo of the originating request's Content-ID, when present.
    pub content_id: Option<String>,
    pub body: Vec<u8>,
}

/// Parses a $batch response payload into the flat, ordered list of logical
/// responses. Changeset members are flattened into the list in wire order.
pub fn parse_batch_response<R: Read>(
    body: R,
    content_type: &str,
) -> Result<Vec<BatchSingleResponse>, BatchError> {
    let boundary = extract_boundary(content_type)?;
    let lines = LineReader::new(body).to_lines()?;
    let parts = split_parts(&lines, &boundary)?;
    debug!(
        "response boundary '{boundary}', {} top-level part(s)",
        parts.len()
    );

    let mut responses = Vec::new();
    for part in &parts {
        collect_part(part, &boundary, false, &mut responses)?;
    }
    Ok(responses)
}

fn collect_part(
    part: &[Line],
    outer_boundary: &str,
    in_changeset: bool,
    out: &mut Vec<BatchSingleResponse>,
) -> Result<(), BatchError> {
    let (mime_headers, body_start) = parse_header_block(part)?;
    let content_type = mime_headers
        .first(headers::CONTENT_TYPE)
        .ok_or_else(|| BatchError::InvalidContentType("<missing Content-Type>".to_string()))?;

    if headers::media_type(content_type) == MULTIPART_MIXED {
        if in_changeset {
            return Err(BatchError::NestedChangesetNotAllowed);
        }
        let changeset_boundary = extract_boundary(content_type)?;
        if changeset_boundary == outer_boundary {
            return Err(BatchError::DuplicateOrClashingBoundary(changeset_boundary));
        }
        let inner_parts = split_parts(&part[body_start..], &changeset_boundary)?;
        for inner in &inner_parts {
            collect_part(inner, &changeset_boundary, true, out)?;
        }
        return Ok(());
    }

    headers::validate_leaf_part_headers(&mime_headers)?;
    out.push(parse_single_response(
        &mime_headers,
        &part[body_start..],
        in_changeset,
    )?);
    Ok(())
}

fn parse_single_response(
    mime_headers: &HeaderTable,
    lines: &[Line],
    in_changeset: bool,
) -> Result<BatchSingleResponse, BatchError> {
    let status_line = lines
        .first()
        .ok_or_else(|| BatchError::invalid_status_line("<empty part>"))?;
    let (status_code, status_reason) = parse_status_line(status_line)?;

    let (http_headers, body_offset) = parse_header_block(&lines[1..])?;

    let content_id = mime_headers
        .first(CONTENT_ID)
        .or_else(|| http_headers.first(CONTENT_ID))
        .map(str::to_string);

    let declared = headers::content_length(&http_headers)?;
    let body = extract_body(&lines[1 + body_offset..], declared, in_changeset)?;

    Ok(BatchSingleResponse {
        status_code,
        status_reason,
        headers: http_headers,
        content_id,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(payload: &[u8], content_type: &str) -> Result<Vec<BatchSingleResponse>, BatchError> {
        parse_batch_response(Cursor::new(payload.to_vec()), content_type)
    }

    #[test]
    fn test_single_response() {
        let payload = b"--b\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
Content-Length: 2\r\n\
\r\n\
{}\r\n\
--b--\r\n";
        let responses = parse(payload, "multipart/mixed; boundary=b").unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status_code, 200);
        assert_eq!(responses[0].status_reason, "OK");
        assert_eq!(responses[0].body, b"{}");
        assert_eq!(
            responses[0].headers.first("content-type"),
            Some("application/json")
        );
    }

    #[test]
    fn test_changeset_responses_are_flattened_with_content_ids() {
        let payload = b"--b\r\n\
Content-Type: multipart/mixed; boundary=cs\r\n\
\r\n\
--cs\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: 1\r\n\
\r\n\
HTTP/1.1 201 Created\r\n\
Location: Employees('7')\r\n\
\r\n\
--cs\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: 2\r\n\
\r\n\
HTTP/1.1 204 No Content\r\n\
\r\n\
--cs--\r\n\
--b--\r\n";
        let responses = parse(payload, "multipart/mixed; boundary=b").unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].status_code, 201);
        assert_eq!(responses[0].content_id.as_deref(), Some("1"));
        assert_eq!(
            responses[0].headers.first("location"),
            Some("Employees('7')")
        );
        assert_eq!(responses[1].status_code, 204);
        assert_eq!(responses[1].content_id.as_deref(), Some("2"));
        assert!(responses[1].body.is_empty());
    }

    #[test]
    fn test_bad_status_line_is_fatal() {
        let payload = b"--b\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/9.9 200 OK\r\n\
\r\n\
--b--\r\n";
        assert!(matches!(
            parse(payload, "multipart/mixed; boundary=b"),
            Err(BatchError::InvalidStatusLine(_))
        ));
    }
}
