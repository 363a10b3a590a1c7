//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::headers::Headers;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

const CRLF: &str = "\r\n";
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target, path plus query, exactly as received
    pub target: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers, names as received
    pub headers: Headers,
    /// The raw request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Create a new HTTP request with an empty body.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method
    /// * `target` - The request target
    /// * `version` - The HTTP version
    /// * `headers` - The HTTP headers
    pub fn new(method: Method, target: impl Into<String>, version: HttpVersion, headers: Headers) -> Self {
        Self {
            method,
            target: target.into(),
            version,
            headers,
            body: Vec::new(),
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(
        method: Method,
        target: impl Into<String>,
        version: HttpVersion,
        headers: Headers,
        body: Vec<u8>,
    ) -> Self {
        let mut request = Self::new(method, target, version, headers);
        request.body = body;
        request
    }

    /// Get a header value, comparing names case-insensitively.
    ///
    /// # Returns
    ///
    /// The header value, if it exists
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get_ignore_case(name)
    }

    /// Check if a header exists (case-insensitive).
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Query parameters parsed from the target.
    ///
    /// Parameters without a value map to an empty string. Values are not
    /// percent-decoded.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.target
            .split_once('?')
            .map(|(_, query)| query
                .split('&')
                .filter(|s| !s.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (pair.to_string(), String::new()),
                })
                .collect())
            .unwrap_or_default()
    }

    /// Parse the request body as JSON.
    ///
    /// # Returns
    ///
    /// The parsed JSON value, or an error if the body is not valid JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body)?;
        Ok(json)
    }

    /// Check if the Content-Type header is application/json.
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }
}

/// Parse an HTTP request from the bytes of a single receive.
///
/// The head ends at the first `\r\n\r\n`; every byte after it is taken as
/// the body verbatim. `Content-Length` is not consulted.
///
/// # Arguments
///
/// * `input` - A byte slice containing the HTTP request to parse
///
/// # Returns
///
/// The parsed HTTP request, or an error if the request is invalid
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let head_end = input
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .ok_or(Error::MalformedRequest)?;

    let head = std::str::from_utf8(&input[..head_end]).map_err(|_| Error::InvalidEncoding)?;
    let body = input[head_end + HEAD_TERMINATOR.len()..].to_vec();

    let mut lines = head.split(CRLF);

    // split always yields at least one item
    let request_line = lines.next().unwrap_or_default();

    let parts: Vec<&str> = request_line.split(' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    };

    let method = Method::from_str(method)?;
    let version = HttpVersion::from_str(version)?;

    let mut headers = Headers::new();
    for line in lines {
        // A line without a colon becomes a name with an empty value
        let (name, value) = line.split_once(':').unwrap_or((line, ""));
        headers.insert(name, value.trim());
    }

    Ok(HttpRequest::with_body(method, target, version, headers, body))
}
