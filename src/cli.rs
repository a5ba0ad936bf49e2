use crate::error::BatchError;
use clap::Parser;
use std::path::PathBuf;

// Command-line interface of the obatch inspection tool.
#[derive(Parser, Clone)]
#[command(
    version,
    about = "Inspect, validate and re-serialize OData $batch multipart payloads.",
    long_about = "Reads a $batch payload from a file, decodes it with the same codec a service would use, and prints a per-part summary.\n\
Request payloads need the transport Content-Type (it carries the batch boundary); response payloads are selected with --response.\n\
With --roundtrip the decoded batch is re-serialized with fresh boundaries and written to stdout, which is handy for normalizing line endings and Content-Length headers of hand-written payloads."
)]
pub struct Cli {
    /// Path to the file holding the raw $batch payload.
    pub input: PathBuf,

    /// Transport-level Content-Type value, e.g. "multipart/mixed; boundary=batch_123".
    #[arg(short, long)]
    pub content_type: String,

    /// Service root URI that relative request targets are resolved against.
    #[arg(short, long, default_value = "http://localhost/odata")]
    pub service_root: String,

    /// Enforce the strict request-line grammar (single-space separators).
    #[arg(long)]
    pub strict: bool,

    /// Treat the payload as a batch response instead of a batch request.
    #[arg(long)]
    pub response: bool,

    /// Re-serialize the decoded batch and print the regenerated payload.
    #[arg(long)]
    pub roundtrip: bool,

    /// Enable verbose logging for debugging (log level: debug).
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate the CLI configuration before any parsing starts.
    pub fn validate(&self) -> Result<(), BatchError> {
        if !self.input.exists() || !self.input.is_file() {
            return Err(BatchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file not found: {}", self.input.display()),
            )));
        }
        if self.response && self.roundtrip {
            // Response payloads regenerate through write_batch_response and
            // change transport status; keep the two modes separate.
            return Err(BatchError::InvalidContentType(
                "--roundtrip only applies to request payloads".to_string(),
            ));
        }
        Ok(())
    }
}
