//! HTTP server for minihttpd.
//!
//! This module holds the response side of the codec, the route table, the
//! per-connection handler and the listener that feeds a bounded pool of
//! workers.

mod config;
mod connection;
mod error;
mod http_server;
mod response;
mod router;
mod tests;

// Re-export public items
pub use config::ServerConfig;
pub use connection::ConnectionHandler;
pub use error::Error;
pub use http_server::HttpServer;
pub use response::{HttpResponse, StatusCode};
pub use router::{HandlerFn, HandlerFuture, Params, RouteHandler, RouteMatcher, Router};
