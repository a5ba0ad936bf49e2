//! # odata-batch
//!
//! Codec for the OData $batch wire format: an RFC 2046 multipart/mixed
//! envelope packing multiple logical HTTP requests (and their responses)
//! into one physical payload, with an inner changeset level for request
//! groups applied atomically.
//!
//! Parsing is byte-exact: bodies keep their original line terminators and
//! non-text payloads survive untouched. The `run` function drives the
//! `obatch` inspection binary.
pub mod accept;
pub mod cli;
pub mod error;
pub mod grammar;
pub mod headers;
pub mod lines;
pub mod request;
pub mod response;
pub mod splitter;
pub mod writer;

use crate::cli::Cli;
use crate::error::BatchError;
use crate::writer::{BatchPart, OutgoingRequest};
use clap::Parser;
use log::error;

/// Initializes the logger, parses command-line arguments, and runs the
/// inspection tool. Errors are logged and mapped to a non-zero exit.
pub fn run() {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.parse_filters(if cli.verbose { "debug" } else { "warn" });
    }
    builder.init();

    if let Err(e) = cli.validate() {
        error!("Configuration validation error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = inspect(&cli) {
        error!("Batch error: {e}");
        std::process::exit(1);
    }
}

fn inspect(cli: &Cli) -> Result<(), BatchError> {
    let file = std::fs::File::open(&cli.input)?;

    if cli.response {
        let responses = response::parse_batch_response(file, &cli.content_type)?;
        println!("{} response(s)", responses.len());
        for (index, r) in responses.iter().enumerate() {
            let id = r.content_id.as_deref().unwrap_or("-");
            println!(
                "  [{index}] {} {} content-id={id} body={}B",
                r.status_code,
                r.status_reason,
                r.body.len()
            );
        }
        return Ok(());
    }

    let parts =
        request::parse_batch_request(&cli.content_type, file, &cli.service_root, cli.strict)?;
    println!("{} top-level part(s)", parts.len());
    for (index, part) in parts.iter().enumerate() {
        let kind = if part.is_changeset() { "changeset" } else { "request" };
        println!("  [{index}] {kind} with {} request(s)", part.requests().len());
        for r in part.requests() {
            let id = r.content_id.as_deref().unwrap_or("-");
            println!("    {} {} content-id={id} body={}B", r.method, r.uri, r.body.len());
        }
    }

    if cli.roundtrip {
        let rebuilt = rebuild_parts(&parts, &cli.service_root);
        let boundary = writer::generate_batch_boundary();
        let payload = writer::write_batch_request(&rebuilt, &boundary)?;
        println!("--- regenerated payload (boundary {boundary}) ---");
        let mut stdout = std::io::stdout();
        std::io::Write::write_all(&mut stdout, &payload)?;
    }

    Ok(())
}

/// Maps parsed requests back onto writer input, relativizing resolved URIs
/// against the service root.
fn rebuild_parts(parts: &[request::BatchRequestPart], service_root: &str) -> Vec<BatchPart> {
    let root = service_root.trim_end_matches('/');
    let relativize = |uri: &str| -> String {
        uri.strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .unwrap_or_else(|| uri.to_string())
    };
    let to_outgoing = |r: &request::ODataRequestLite| -> OutgoingRequest {
        let mut out = OutgoingRequest::new(r.method, &relativize(&r.uri));
        for (name, values) in r.headers.iter() {
            if name.eq_ignore_ascii_case(headers::CONTENT_LENGTH) {
                continue;
            }
            for value in values {
                out.headers.push((name.to_string(), value.clone()));
            }
        }
        out.content_id = r.content_id.clone();
        out.body = r.body.clone();
        out
    };

    parts
        .iter()
        .map(|part| match part {
            request::BatchRequestPart::Single(r) => BatchPart::Single(to_outgoing(r)),
            request::BatchRequestPart::ChangeSet(rs) => {
                BatchPart::ChangeSet(rs.iter().map(to_outgoing).collect())
            }
        })
        .collect()
}
