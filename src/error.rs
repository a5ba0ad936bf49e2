// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors raised while decoding or encoding a $batch payload.
///
/// A malformed batch aborts the whole parse: there is no partial-result
/// mode, the first fatal condition wins.
#[derive(Debug)]
pub enum BatchError {
    Io(std::io::Error),
    /// The outer Content-Type is not multipart/mixed or carries no usable value.
    InvalidContentType(String),
    /// multipart/mixed without a boundary parameter, or an unusable boundary token.
    NoBoundaryFound(String),
    /// The stream ended before the `--boundary--` close delimiter.
    MissingCloseDelimiter,
    /// Bad or missing MIME part header (e.g. Content-Transfer-Encoding).
    InvalidMimeHeader(String),
    /// Disallowed verb inside a changeset.
    InvalidMethod(String),
    /// Malformed embedded request line (missing version, garbage, bad target).
    InvalidRequestLine(String),
    /// Malformed embedded status line.
    InvalidStatusLine(String),
    /// A changeset declared inside another changeset.
    NestedChangesetNotAllowed,
    /// Inner changeset boundary equal to the enclosing batch boundary.
    DuplicateOrClashingBoundary(String),
    /// `$<id>` reference naming a Content-ID not registered in this changeset.
    UnresolvedContentIdReference(String),
    /// Non-numeric Content-Length, or negative where the grammar requires an error.
    InvalidContentLength(String),
    InvalidAcceptHeader(String),
    InvalidAcceptLanguage(String),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Io(err) => write!(f, "IO error: {err}"),
            BatchError::InvalidContentType(found) => {
                write!(f, "Invalid content type '{found}'")
            }
            BatchError::NoBoundaryFound(content_type) => {
                write!(f, "No boundary found in content type '{content_type}'")
            }
            BatchError::MissingCloseDelimiter => {
                write!(f, "Missing close delimiter")
            }
            BatchError::InvalidMimeHeader(detail) => {
                write!(f, "Invalid MIME header: {detail}")
            }
            BatchError::InvalidMethod(method) => {
                write!(f, "Method '{method}' is not allowed in a change set")
            }
            BatchError::InvalidRequestLine(line) => {
                write!(f, "Invalid request line '{line}'")
            }
            BatchError::InvalidStatusLine(line) => {
                write!(f, "Invalid status line '{line}'")
            }
            BatchError::NestedChangesetNotAllowed => {
                write!(f, "A change set must not contain another change set")
            }
            BatchError::DuplicateOrClashingBoundary(boundary) => {
                write!(
                    f,
                    "Change set boundary '{boundary}' clashes with the batch boundary"
                )
            }
            BatchError::UnresolvedContentIdReference(id) => {
                write!(f, "Unresolved Content-ID reference '${id}'")
            }
            BatchError::InvalidContentLength(value) => {
                write!(f, "Invalid Content-Length '{value}'")
            }
            BatchError::InvalidAcceptHeader(value) => {
                write!(f, "Invalid Accept header value '{value}'")
            }
            BatchError::InvalidAcceptLanguage(value) => {
                write!(f, "Invalid Accept-Language value '{value}'")
            }
        }
    }
}

impl From<std::io::Error> for BatchError {
    fn from(err: std::io::Error) -> Self {
        BatchError::Io(err)
    }
}

impl std::error::Error for BatchError {}

impl BatchError {
    /// Creates an InvalidMimeHeader error from any displayable detail.
    pub fn invalid_mime_header<S: Into<String>>(detail: S) -> Self {
        BatchError::InvalidMimeHeader(detail.into())
    }

    /// Creates an InvalidRequestLine error carrying the offending line.
    pub fn invalid_request_line<S: Into<String>>(line: S) -> Self {
        BatchError::InvalidRequestLine(line.into())
    }

    /// Creates an InvalidStatusLine error carrying the offending line.
    pub fn invalid_status_line<S: Into<String>>(line: S) -> Self {
        BatchError::InvalidStatusLine(line.into())
    }

    /// Creates an InvalidContentLength error carrying the offending value.
    pub fn invalid_content_length<S: Into<String>>(value: S) -> Self {
        BatchError::InvalidContentLength(value.into())
    }

    /// Checks whether the error concerns the multipart envelope itself rather
    /// than an embedded request or response.
    pub fn is_envelope_error(&self) -> bool {
        matches!(
            self,
            BatchError::InvalidContentType(_)
                | BatchError::NoBoundaryFound(_)
                | BatchError::MissingCloseDelimiter
                | BatchError::NestedChangesetNotAllowed
                | BatchError::DuplicateOrClashingBoundary(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = [
            BatchError::InvalidContentType("text/plain".to_string()),
            BatchError::NoBoundaryFound("multipart/mixed".to_string()),
            BatchError::MissingCloseDelimiter,
            BatchError::InvalidMethod("GET".to_string()),
            BatchError::UnresolvedContentIdReference("NewEmployee".to_string()),
            BatchError::invalid_content_length("10abc"),
        ];

        let expected = [
            "Invalid content type 'text/plain'",
            "No boundary found in content type 'multipart/mixed'",
            "Missing close delimiter",
            "Method 'GET' is not allowed in a change set",
            "Unresolved Content-ID reference '$NewEmployee'",
            "Invalid Content-Length '10abc'",
        ];

        for (error, expected_msg) in errors.iter().zip(expected.iter()) {
            assert_eq!(error.to_string(), *expected_msg);
        }
    }

    #[test]
    fn test_is_envelope_error() {
        assert!(BatchError::MissingCloseDelimiter.is_envelope_error());
        assert!(BatchError::NestedChangesetNotAllowed.is_envelope_error());
        assert!(!BatchError::InvalidMethod("GET".to_string()).is_envelope_error());
        assert!(!BatchError::invalid_content_length("-1").is_envelope_error());
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = BatchError::MissingCloseDelimiter;
        let _: &dyn std::error::Error = &error;
    }
}
