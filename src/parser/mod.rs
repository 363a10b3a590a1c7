//! HTTP request decoding.
//!
//! This module turns the bytes of a single receive into an [`HttpRequest`].
//! The framing is deliberately simple: everything before the first blank
//! line is the head, everything after it is the body.

mod error;
mod headers;
mod method;
mod request;
mod version;

// Re-export public items
pub use error::Error;
pub use headers::Headers;
pub use method::Method;
pub use request::HttpRequest;
pub use version::HttpVersion;

// Re-export the parse_request function
pub use request::parse_request;
