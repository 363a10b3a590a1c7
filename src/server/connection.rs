//! Servicing of a single accepted connection.

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::parser::{HttpRequest, parse_request};
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::Router;

/// Owns the per-connection contract: one receive, one request, one
/// response, then close.
#[derive(Clone)]
pub struct ConnectionHandler {
    router: Arc<Router>,
    read_buffer_size: usize,
}

impl ConnectionHandler {
    /// A zero `read_buffer_size` is raised to one byte so the receive can
    /// still tell data from a closed peer.
    pub fn new(router: Arc<Router>, read_buffer_size: usize) -> Self {
        Self {
            router,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Service a connection end to end.
    ///
    /// The stream is consumed and dropped on every return path, which
    /// closes it. Bytes the peer sends beyond what the single receive
    /// returns are never read. A request that fails to decode gets no
    /// response at all.
    pub async fn service<S>(&self, mut stream: S) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0; self.read_buffer_size];

        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Peer closed the connection before sending a request");
            return Ok(());
        }

        let request = match parse_request(&buf[..n]) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping connection, request could not be decoded: {e}");
                return Err(Error::ParseError(e));
            }
        };
        drop(buf);

        let response = self.handle_request(request).await;

        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Dispatch a decoded request to its route.
    ///
    /// Unmatched requests get a bare `404 Not Found`. A failing handler is
    /// answered with a bare `500 Internal Server Error`.
    pub async fn handle_request(&self, request: HttpRequest) -> HttpResponse {
        debug!("{method} {target} {version}", method = request.method, target = request.target, version = request.version);

        let Some((route, params)) = self.router.find(&request) else {
            debug!("No route for {method} {target}", method = request.method, target = request.target);
            return HttpResponse::not_found();
        };

        let method = request.method;
        let target = request.target.clone();

        match (route.handler)(request, params).await {
            Ok(response) => response,
            Err(e) => {
                error!("Handler for {method} {target} failed: {e}");
                HttpResponse::new(StatusCode::InternalServerError)
            }
        }
    }
}
