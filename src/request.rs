//! Request-side decoding of a $batch payload.
//!
//! The pipeline is `RawLines -> Parts -> ClassifiedParts -> AssembledRequests`:
//! lines come from [`crate::lines::LineReader`], parts from
//! [`crate::splitter::split_parts`], and each part is classified as either a
//! leaf request or a changeset envelope, which recurses through the splitter
//! exactly one more level. No state is shared across calls; the Content-ID
//! registry lives only for the changeset being parsed.

use crate::accept::{parse_accept_headers, parse_accept_languages};
use crate::error::BatchError;
use crate::grammar::{Method, parse_request_line};
use crate::headers::{
    self, ACCEPT, ACCEPT_LANGUAGE, CONTENT_ID, HeaderTable, MULTIPART_MIXED, parse_header_block,
};
use crate::lines::Line;
use crate::splitter::{
    concat_raw, extract_boundary, remove_ending_crlf, split_parts, trim_lines_to_length,
};
use log::debug;
use std::collections::HashMap;
use std::io::Read;

/// One logical request decoded from a batch.
#[derive(Debug, Clone)]
pub struct ODataRequestLite {
    pub method: Method,
    /// Request target resolved against the service root (or a Content-ID
    /// reference base).
    pub uri: String,
    /// The embedded HTTP headers, order-preserving.
    pub headers: HeaderTable,
    /// Accept media ranges, quality-ordered.
    pub accept_types: Vec<String>,
    /// Accept-Language tags, quality-ordered.
    pub accept_languages: Vec<String>,
    pub content_id: Option<String>,
    /// Raw body bytes, exactly as framed on the wire.
    pub body: Vec<u8>,
}

/// One top-level part of the batch: either a single request or an atomic
/// changeset of requests. The two cases are structurally closed, so they
/// are a tagged union rather than a trait object.
#[derive(Debug, Clone)]
pub enum BatchRequestPart {
    Single(ODataRequestLite),
    ChangeSet(Vec<ODataRequestLite>),
}

impl BatchRequestPart {
    pub fn is_changeset(&self) -> bool {
        matches!(self, BatchRequestPart::ChangeSet(_))
    }

    /// The member requests in wire order; a single part yields one element.
    pub fn requests(&self) -> &[ODataRequestLite] {
        match self {
            BatchRequestPart::Single(request) => std::slice::from_ref(request),
            BatchRequestPart::ChangeSet(requests) => requests,
        }
    }
}

/// Changeset-scoped symbol table mapping a Content-ID to the target URI of
/// the request that declared it. Created when changeset parsing begins and
/// dropped when it ends.
#[derive(Debug, Default)]
pub struct ContentIdRegistry {
    entries: HashMap<String, String>,
}

impl ContentIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, uri: &str) {
        self.entries.insert(id.to_string(), uri.to_string());
    }

    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }
}

/// Parses a $batch request payload into its ordered top-level parts.
///
/// `content_type` is the transport-level Content-Type carrying the batch
/// boundary. `service_root` is the caller-supplied base every relative
/// request target is resolved against. `strict` tightens the embedded
/// request-line grammar to single-space separators.
pub fn parse_batch_request<R: Read>(
    content_type: &str,
    body: R,
    service_root: &str,
    strict: bool,
) -> Result<Vec<BatchRequestPart>, BatchError> {
    let boundary = extract_boundary(content_type)?;
    let lines = crate::lines::LineReader::new(body).to_lines()?;
    let parts = split_parts(&lines, &boundary)?;
    debug!("batch boundary '{boundary}', {} top-level part(s)", parts.len());

    let mut result = Vec::with_capacity(parts.len());
    for part in &parts {
        result.push(classify_part(part, &boundary, service_root, strict)?);
    }
    Ok(result)
}

fn classify_part(
    part: &[Line],
    batch_boundary: &str,
    service_root: &str,
    strict: bool,
) -> Result<BatchRequestPart, BatchError> {
    let (mime_headers, body_start) = parse_header_block(part)?;
    let content_type = mime_headers
        .first(headers::CONTENT_TYPE)
        .ok_or_else(|| BatchError::InvalidContentType("<missing Content-Type>".to_string()))?;

    if headers::media_type(content_type) == MULTIPART_MIXED {
        let changeset_boundary = extract_boundary(content_type)?;
        if changeset_boundary == batch_boundary {
            return Err(BatchError::DuplicateOrClashingBoundary(changeset_boundary));
        }
        let requests =
            parse_changeset(&part[body_start..], &changeset_boundary, service_root, strict)?;
        return Ok(BatchRequestPart::ChangeSet(requests));
    }

    headers::validate_leaf_part_headers(&mime_headers)?;
    let request = parse_single_request(
        &mime_headers,
        &part[body_start..],
        service_root,
        strict,
        None,
    )?;
    Ok(BatchRequestPart::Single(request))
}

fn parse_changeset(
    envelope: &[Line],
    boundary: &str,
    service_root: &str,
    strict: bool,
) -> Result<Vec<ODataRequestLite>, BatchError> {
    let parts = split_parts(envelope, boundary)?;
    debug!("changeset boundary '{boundary}', {} request(s)", parts.len());

    let mut registry = ContentIdRegistry::new();
    let mut requests = Vec::with_capacity(parts.len());

    for part in &parts {
        let (mime_headers, body_start) = parse_header_block(part)?;
        if let Some(content_type) = mime_headers.first(headers::CONTENT_TYPE) {
            if headers::media_type(content_type) == MULTIPART_MIXED {
                return Err(BatchError::NestedChangesetNotAllowed);
            }
        }
        headers::validate_leaf_part_headers(&mime_headers)?;
        requests.push(parse_single_request(
            &mime_headers,
            &part[body_start..],
            service_root,
            strict,
            Some(&mut registry),
        )?);
    }
    Ok(requests)
}

fn parse_single_request(
    mime_headers: &HeaderTable,
    lines: &[Line],
    service_root: &str,
    strict: bool,
    mut registry: Option<&mut ContentIdRegistry>,
) -> Result<ODataRequestLite, BatchError> {
    let in_changeset = registry.is_some();
    let request_line = lines
        .first()
        .ok_or_else(|| BatchError::invalid_request_line("<empty part>"))?;
    let (method, target) = parse_request_line(request_line, strict)?;

    if in_changeset && !method.is_allowed_in_changeset() {
        return Err(BatchError::InvalidMethod(method.to_string()));
    }

    let (http_headers, body_offset) = parse_header_block(&lines[1..])?;

    // The MIME-level Content-ID and the inner pseudo-HTTP Content-Id are
    // both accepted; the MIME one wins when both are present.
    let content_id = mime_headers
        .first(CONTENT_ID)
        .or_else(|| http_headers.first(CONTENT_ID))
        .map(str::to_string);

    let accept_types = match http_headers.joined(ACCEPT) {
        Some(raw) => parse_accept_headers(&raw)?,
        None => Vec::new(),
    };
    let accept_languages = match http_headers.joined(ACCEPT_LANGUAGE) {
        Some(raw) => parse_accept_languages(&raw)?,
        None => Vec::new(),
    };

    let uri = resolve_target(&target, service_root, registry.as_deref())?;
    if let (Some(registry), Some(id)) = (registry.as_deref_mut(), content_id.as_deref()) {
        registry.register(id, &uri);
    }

    let declared = headers::content_length(&http_headers)?;
    let body = extract_body(&lines[1 + body_offset..], declared, in_changeset)?;

    Ok(ODataRequestLite {
        method,
        uri,
        headers: http_headers,
        accept_types,
        accept_languages,
        content_id,
        body,
    })
}

/// Builds the body bytes of a leaf part per the declared Content-Length.
///
/// A declared length longer than the physically available body is tolerated;
/// the body is simply shorter than declared. A negative length is fatal for
/// a standalone part but tolerated inside a changeset, where it falls back
/// to delimiter-bounded framing. This asymmetry is a deliberate
/// compatibility requirement.
pub(crate) fn extract_body(
    lines: &[Line],
    declared: Option<i64>,
    in_changeset: bool,
) -> Result<Vec<u8>, BatchError> {
    match declared {
        Some(length) if length < 0 => {
            if in_changeset {
                Ok(delimiter_bounded_body(lines))
            } else {
                Err(BatchError::invalid_content_length(length.to_string()))
            }
        }
        Some(length) => {
            // The delimiter-owned terminator is never part of the declared
            // length, so it is stripped before trimming.
            let mut lines = lines.to_vec();
            remove_ending_crlf(&mut lines);
            Ok(concat_raw(&trim_lines_to_length(&lines, length as usize)))
        }
        None => Ok(delimiter_bounded_body(lines)),
    }
}

/// Without a Content-Length the body runs to the next delimiter, minus the
/// one terminator that RFC 2046 assigns to the delimiter line itself.
fn delimiter_bounded_body(lines: &[Line]) -> Vec<u8> {
    let mut lines = lines.to_vec();
    remove_ending_crlf(&mut lines);
    concat_raw(&lines)
}

fn resolve_target(
    target: &str,
    service_root: &str,
    registry: Option<&ContentIdRegistry>,
) -> Result<String, BatchError> {
    if let Some(reference) = target.strip_prefix('$') {
        let (id, remainder) = match reference.split_once('/') {
            Some((id, rest)) => (id, Some(rest)),
            None => (reference, None),
        };
        let registry = registry
            .ok_or_else(|| BatchError::UnresolvedContentIdReference(id.to_string()))?;
        let base = registry
            .resolve(id)
            .ok_or_else(|| BatchError::UnresolvedContentIdReference(id.to_string()))?;
        return Ok(match remainder {
            Some(rest) => format!("{base}/{rest}"),
            None => base.to_string(),
        });
    }

    if target.contains("://") {
        // Absolute targets are only legal when they already sit under the
        // service root.
        if target.starts_with(service_root) {
            return Ok(target.to_string());
        }
        return Err(BatchError::invalid_request_line(target));
    }

    if target.split('/').any(|segment| segment == "..") {
        return Err(BatchError::invalid_request_line(target));
    }

    let root = service_root.trim_end_matches('/');
    let path = target.trim_start_matches('/');
    Ok(format!("{root}/{path}"))
}
