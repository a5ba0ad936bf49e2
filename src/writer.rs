//! Serialization of batch requests and responses back to the wire format.
//!
//! The writer is the inverse of the parsing pipeline: it emits CRLF line
//! endings throughout, `application/http` + `binary` part headers, a
//! computed byte-exact Content-Length per leaf, and fresh boundaries for the
//! batch and for every changeset. Output goes to any `io::Write`, with
//! in-memory convenience wrappers; bodies are written verbatim, so non-text
//! payloads survive untouched.

use crate::error::BatchError;
use crate::grammar::{Method, reason_phrase};
use crate::splitter::validate_boundary;
use std::io::Write;
use uuid::Uuid;

const CRLF: &[u8] = b"\r\n";

/// A request to be serialized into a batch.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Request target relative to the service root, written verbatim.
    pub target: String,
    /// Extra embedded HTTP headers, written in order. Content-Length is
    /// always computed and must not be supplied here.
    pub headers: Vec<(String, String)>,
    pub content_id: Option<String>,
    /// Body bytes, already encoded in the charset the headers declare
    /// (UTF-8 when unspecified). Content-Length is their exact count.
    pub body: Vec<u8>,
}

impl OutgoingRequest {
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            headers: Vec::new(),
            content_id: None,
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn content_id(mut self, id: &str) -> Self {
        self.content_id = Some(id.to_string());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// A response to be serialized into a batch response payload.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub status_code: u16,
    /// Reason phrase; the canonical phrase for the code is used when empty.
    pub status_reason: String,
    pub headers: Vec<(String, String)>,
    pub content_id: Option<String>,
    pub body: Vec<u8>,
}

impl OutgoingResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            status_reason: String::new(),
            headers: Vec::new(),
            content_id: None,
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn content_id(mut self, id: &str) -> Self {
        self.content_id = Some(id.to_string());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// One top-level part of an outgoing batch request.
#[derive(Debug, Clone)]
pub enum BatchPart {
    Single(OutgoingRequest),
    /// Atomic group serialized as a nested changeset.
    ChangeSet(Vec<OutgoingRequest>),
}

/// One top-level part of an outgoing batch response.
#[derive(Debug, Clone)]
pub enum BatchResponsePart {
    Single(OutgoingResponse),
    ChangeSet(Vec<OutgoingResponse>),
}

/// The wrapped batch response: entity bytes plus the transport headers the
/// caller must attach. Batch responses are always `202 Accepted`.
#[derive(Debug)]
pub struct BatchResponsePayload {
    pub entity: Vec<u8>,
    pub content_type: String,
    pub status_code: u16,
}

/// Fresh boundary for a batch envelope.
pub fn generate_batch_boundary() -> String {
    format!("batch_{}", Uuid::new_v4())
}

/// Fresh boundary for a changeset, guaranteed textually distinct from the
/// enclosing boundary.
pub fn generate_changeset_boundary(outer: &str) -> String {
    loop {
        let boundary = format!("changeset_{}", Uuid::new_v4());
        if boundary != outer {
            return boundary;
        }
    }
}

fn write_line<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.write_all(CRLF)
}

fn write_leaf_mime_headers<W: Write>(
    out: &mut W,
    content_id: Option<&str>,
) -> std::io::Result<()> {
    write_line(out, "Content-Type: application/http")?;
    write_line(out, "Content-Transfer-Encoding: binary")?;
    if let Some(id) = content_id {
        write_line(out, &format!("Content-ID: {id}"))?;
    }
    out.write_all(CRLF)
}

fn write_request_leaf<W: Write>(out: &mut W, request: &OutgoingRequest) -> std::io::Result<()> {
    write_leaf_mime_headers(out, request.content_id.as_deref())?;
    write_line(
        out,
        &format!("{} {} HTTP/1.1", request.method, request.target),
    )?;
    for (name, value) in &request.headers {
        write_line(out, &format!("{name}: {value}"))?;
    }
    if !request.body.is_empty() {
        write_line(out, &format!("Content-Length: {}", request.body.len()))?;
    }
    out.write_all(CRLF)?;
    if !request.body.is_empty() {
        out.write_all(&request.body)?;
        // This CRLF belongs to the delimiter line that follows.
        out.write_all(CRLF)?;
    }
    Ok(())
}

fn write_response_leaf<W: Write>(out: &mut W, response: &OutgoingResponse) -> std::io::Result<()> {
    write_leaf_mime_headers(out, response.content_id.as_deref())?;
    let reason = if response.status_reason.is_empty() {
        reason_phrase(response.status_code)
    } else {
        &response.status_reason
    };
    write_line(out, &format!("HTTP/1.1 {} {reason}", response.status_code))?;
    for (name, value) in &response.headers {
        write_line(out, &format!("{name}: {value}"))?;
    }
    write_line(out, &format!("Content-Length: {}", response.body.len()))?;
    out.write_all(CRLF)?;
    if !response.body.is_empty() {
        out.write_all(&response.body)?;
        out.write_all(CRLF)?;
    }
    Ok(())
}

/// Streams a batch request payload to `out` using the given batch boundary.
pub fn write_batch_request_to<W: Write>(
    parts: &[BatchPart],
    boundary: &str,
    out: &mut W,
) -> Result<(), BatchError> {
    validate_boundary(boundary, true)?;

    for part in parts {
        write_line(out, &format!("--{boundary}"))?;
        match part {
            BatchPart::Single(request) => write_request_leaf(out, request)?,
            BatchPart::ChangeSet(requests) => {
                let changeset_boundary = generate_changeset_boundary(boundary);
                write_line(
                    out,
                    &format!("Content-Type: multipart/mixed; boundary={changeset_boundary}"),
                )?;
                out.write_all(CRLF)?;
                for request in requests {
                    write_line(out, &format!("--{changeset_boundary}"))?;
                    write_request_leaf(out, request)?;
                }
                write_line(out, &format!("--{changeset_boundary}--"))?;
            }
        }
    }
    write_line(out, &format!("--{boundary}--"))?;
    Ok(())
}

/// Serializes a batch request payload to memory.
pub fn write_batch_request(parts: &[BatchPart], boundary: &str) -> Result<Vec<u8>, BatchError> {
    let mut buffer = Vec::new();
    write_batch_request_to(parts, boundary, &mut buffer)?;
    Ok(buffer)
}

/// Streams a batch response payload to `out` using the given batch boundary.
pub fn write_batch_response_to<W: Write>(
    parts: &[BatchResponsePart],
    boundary: &str,
    out: &mut W,
) -> Result<(), BatchError> {
    validate_boundary(boundary, true)?;

    for part in parts {
        write_line(out, &format!("--{boundary}"))?;
        match part {
            BatchResponsePart::Single(response) => write_response_leaf(out, response)?,
            BatchResponsePart::ChangeSet(responses) => {
                let changeset_boundary = generate_changeset_boundary(boundary);
                write_line(
                    out,
                    &format!("Content-Type: multipart/mixed; boundary={changeset_boundary}"),
                )?;
                out.write_all(CRLF)?;
                for response in responses {
                    write_line(out, &format!("--{changeset_boundary}"))?;
                    write_response_leaf(out, response)?;
                }
                write_line(out, &format!("--{changeset_boundary}--"))?;
            }
        }
    }
    write_line(out, &format!("--{boundary}--"))?;
    Ok(())
}

/// Serializes a batch response payload, wrapping it with the content type
/// and the fixed `202 Accepted` transport status.
pub fn write_batch_response(
    parts: &[BatchResponsePart],
) -> Result<BatchResponsePayload, BatchError> {
    let boundary = generate_batch_boundary();
    let mut entity = Vec::new();
    write_batch_response_to(parts, &boundary, &mut entity)?;
    Ok(BatchResponsePayload {
        entity,
        content_type: format!("multipart/mixed; boundary={boundary}"),
        status_code: 202,
    })
}
