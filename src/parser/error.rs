//! Error types for the HTTP parser.

use thiserror::Error;

/// Errors that can occur while decoding an HTTP request.
#[derive(Debug, Error)]
pub enum Error {
    /// No `\r\n\r\n` separator between the head and the body.
    #[error("Malformed request: no end of head found")]
    MalformedRequest,

    /// The request line does not split into exactly three tokens.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The method token is not a known HTTP method.
    #[error("Unknown HTTP method: {0}")]
    UnknownMethod(String),

    /// The version token is not a supported HTTP version.
    #[error("Unknown HTTP version: {0}")]
    UnknownVersion(String),

    /// The request head is not valid UTF-8.
    #[error("Request head is not valid UTF-8")]
    InvalidEncoding,

    /// A header required by the caller is missing.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
