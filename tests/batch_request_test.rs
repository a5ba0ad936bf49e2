// SPDX-License-Identifier: MIT

use odata_batch::error::BatchError;
use odata_batch::grammar::Method;
use odata_batch::request::parse_batch_request;
use std::io::Cursor;

const CONTENT_TYPE: &str = "multipart/mixed; boundary=batch_8194-cf13-1f56";
const SERVICE_ROOT: &str = "http://localhost/odata";

fn parse(payload: &[u8]) -> Result<Vec<odata_batch::request::BatchRequestPart>, BatchError> {
    parse_batch_request(
        CONTENT_TYPE,
        Cursor::new(payload.to_vec()),
        SERVICE_ROOT,
        false,
    )
}

fn mixed_batch() -> Vec<u8> {
    b"--batch_8194-cf13-1f56\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
GET Employees('1')/EmployeeName HTTP/1.1\r\n\
Accept: application/json\r\n\
Accept-Language: en-US\r\n\
\r\n\
--batch_8194-cf13-1f56\r\n\
Content-Type: multipart/mixed; boundary=changeset_f980-1cb6-94dd\r\n\
\r\n\
--changeset_f980-1cb6-94dd\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: NewEmployee\r\n\
\r\n\
POST Employees HTTP/1.1\r\n\
Content-Type: application/json\r\n\
Content-Length: 29\r\n\
\r\n\
{\"EmployeeName\":\"Peter Fall\"}\r\n\
--changeset_f980-1cb6-94dd\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: 2\r\n\
\r\n\
PUT $NewEmployee/EmployeeName HTTP/1.1\r\n\
Content-Type: application/json\r\n\
Content-Length: 20\r\n\
\r\n\
{\"EmployeeName\":\"x\"}\r\n\
--changeset_f980-1cb6-94dd--\r\n\
--batch_8194-cf13-1f56--\r\n"
        .to_vec()
}

#[test]
fn test_query_and_changeset_batch() {
    let parts = parse(&mixed_batch()).unwrap();
    assert_eq!(parts.len(), 2);

    let query = &parts[0];
    assert!(!query.is_changeset());
    assert_eq!(query.requests().len(), 1);
    let get = &query.requests()[0];
    assert_eq!(get.method, Method::Get);
    assert_eq!(
        get.uri,
        "http://localhost/odata/Employees('1')/EmployeeName"
    );
    assert_eq!(get.accept_types, vec!["application/json"]);
    assert_eq!(get.accept_languages, vec!["en-US"]);
    assert!(get.body.is_empty());
    assert!(get.content_id.is_none());

    let changeset = &parts[1];
    assert!(changeset.is_changeset());
    assert_eq!(changeset.requests().len(), 2);

    let post = &changeset.requests()[0];
    assert_eq!(post.method, Method::Post);
    assert_eq!(post.content_id.as_deref(), Some("NewEmployee"));
    assert_eq!(post.body, b"{\"EmployeeName\":\"Peter Fall\"}");

    let put = &changeset.requests()[1];
    assert_eq!(put.method, Method::Put);
    assert_eq!(
        put.uri,
        "http://localhost/odata/Employees/EmployeeName"
    );
    assert_eq!(put.body, b"{\"EmployeeName\":\"x\"}");
}

#[test]
fn test_preamble_and_epilogue_are_tolerated() {
    let mut payload = b"this is a preamble the parser must skip\r\nsecond preamble line\r\n".to_vec();
    payload.extend_from_slice(&mixed_batch());
    payload.extend_from_slice(b"epilogue noise after the close delimiter\r\n");

    let parts = parse(&payload).unwrap();
    assert_eq!(parts.len(), 2);
}

#[test]
fn test_unresolved_content_id_reference() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: multipart/mixed; boundary=cs\r\n\
\r\n\
--cs\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
PUT $Missing/EmployeeName HTTP/1.1\r\n\
\r\n\
--cs--\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(
        parse(payload),
        Err(BatchError::UnresolvedContentIdReference(id)) if id == "Missing"
    ));
}

#[test]
fn test_forward_reference_is_unresolved() {
    // The reference appears before the request that declares the id.
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: multipart/mixed; boundary=cs\r\n\
\r\n\
--cs\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
PUT $Late/Name HTTP/1.1\r\n\
\r\n\
--cs\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
Content-ID: Late\r\n\
\r\n\
POST Employees HTTP/1.1\r\n\
\r\n\
--cs--\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(
        parse(payload),
        Err(BatchError::UnresolvedContentIdReference(_))
    ));
}

#[test]
fn test_get_inside_changeset_is_rejected() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: multipart/mixed; boundary=cs\r\n\
\r\n\
--cs\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
GET Employees HTTP/1.1\r\n\
\r\n\
--cs--\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(parse(payload), Err(BatchError::InvalidMethod(m)) if m == "GET"));
}

#[test]
fn test_nested_changeset_is_rejected() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: multipart/mixed; boundary=cs\r\n\
\r\n\
--cs\r\n\
Content-Type: multipart/mixed; boundary=inner\r\n\
\r\n\
--inner\r\n\
--inner--\r\n\
--cs--\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(
        parse(payload),
        Err(BatchError::NestedChangesetNotAllowed)
    ));
}

#[test]
fn test_changeset_boundary_clash_is_rejected() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: multipart/mixed; boundary=batch_8194-cf13-1f56\r\n\
\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(
        parse(payload),
        Err(BatchError::DuplicateOrClashingBoundary(_))
    ));
}

#[test]
fn test_missing_close_delimiter_is_fatal() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
GET Employees HTTP/1.1\r\n\
\r\n";
    assert!(matches!(
        parse(payload),
        Err(BatchError::MissingCloseDelimiter)
    ));
}

#[test]
fn test_missing_content_type_on_part_is_fatal() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
GET Employees HTTP/1.1\r\n\
\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(
        parse(payload),
        Err(BatchError::InvalidContentType(_))
    ));
}

#[test]
fn test_bad_transfer_encoding_is_fatal() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
GET Employees HTTP/1.1\r\n\
\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(parse(payload), Err(BatchError::InvalidMimeHeader(_))));
}

#[test]
fn test_strict_mode_rejects_sloppy_request_line() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
GET   Employees HTTP/1.1\r\n\
\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(
        parse_batch_request(
            CONTENT_TYPE,
            Cursor::new(payload.to_vec()),
            SERVICE_ROOT,
            true,
        )
        .is_err()
    );
    // The lenient parser accepts the same payload.
    assert!(parse(payload).is_ok());
}

#[test]
fn test_request_line_without_version_is_fatal() {
    let payload = b"--batch_8194-cf13-1f56\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
GET Employees\r\n\
\r\n\
--batch_8194-cf13-1f56--\r\n";
    assert!(matches!(parse(payload), Err(BatchError::InvalidRequestLine(_))));
}

#[test]
fn test_wrong_outer_content_type() {
    let result = parse_batch_request(
        "application/json",
        Cursor::new(mixed_batch()),
        SERVICE_ROOT,
        false,
    );
    assert!(matches!(result, Err(BatchError::InvalidContentType(_))));

    let result = parse_batch_request(
        "multipart/mixed",
        Cursor::new(mixed_batch()),
        SERVICE_ROOT,
        false,
    );
    assert!(matches!(result, Err(BatchError::NoBoundaryFound(_))));
}
