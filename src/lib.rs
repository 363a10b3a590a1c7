//! A minimal HTTP/1.1 server framework.
//!
//! `minihttpd` accepts TCP connections, decodes one request per connection,
//! dispatches it to a handler chosen by method and path template, and
//! writes the handler's response back before closing the connection.
//!
//! # Features
//!
//! - Decode HTTP/1.0 and HTTP/1.1 requests from the bytes of a single receive
//! - Encode responses exactly as the handler built them
//! - Path templates with named placeholders, e.g. `/files/<file_name>`
//! - A bounded pool of workers servicing connections concurrently
//! - Graceful shutdown on Ctrl+C or a caller supplied signal
//!
//! # Examples
//!
//! ## Decoding a request
//!
//! ```
//! use minihttpd::{parse_request, Method};
//!
//! let request = parse_request(b"GET /echo/hello HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
//!
//! assert_eq!(request.method, Method::GET);
//! assert_eq!(request.target, "/echo/hello");
//! assert_eq!(request.headers.get("Host"), Some("localhost"));
//! ```
//!
//! ## Registering routes
//!
//! ```no_run
//! use minihttpd::{HttpResponse, HttpServer, Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), minihttpd::ServerError> {
//!     let mut server = HttpServer::bind_to("localhost", 4221);
//!
//!     server.add_route("/echo/<to_echo>", Method::GET, |_req, params| async move {
//!         let value = params.get("to_echo").cloned().unwrap_or_default();
//!         Ok(HttpResponse::new(StatusCode::Ok)
//!             .with_content_type("text/plain")
//!             .with_body_string(value))
//!     })?;
//!
//!     server.run().await
//! }
//! ```

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Application routes used by the binary
pub mod routes;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, Headers, HttpRequest, HttpVersion, Method, parse_request};
pub use server::{Error as ServerError, HttpResponse, HttpServer, Params, Router, ServerConfig, StatusCode};
