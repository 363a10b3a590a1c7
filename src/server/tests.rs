//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio::time;

    use crate::parser::{HttpRequest, Method};
    use crate::server::{ConnectionHandler, Error, HttpResponse, HttpServer, Params, Router, ServerConfig, StatusCode};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self {
                read_data: Cursor::new(read_data),
                write_data: Vec::new(),
            }
        }

        fn written_data(&self) -> &[u8] {
            &self.write_data
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = std::io::Read::read(&mut this.read_data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn echo(_req: HttpRequest, params: Params) -> Result<HttpResponse, Error> {
        let value = params.get("to_echo").cloned().unwrap_or_default();
        Ok(HttpResponse::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body_string(value))
    }

    fn test_router() -> Router {
        let mut router = Router::new();
        router.register("/", Method::GET, |_req, _params| async {
            Ok(HttpResponse::new(StatusCode::Ok))
        }).unwrap();
        router.register("/echo/<to_echo>", Method::GET, echo).unwrap();
        router.register("/upload", Method::POST, |req: HttpRequest, _params| async move {
            Ok(HttpResponse::new(StatusCode::Created).with_body_bytes(req.body))
        }).unwrap();
        router.register("/fail", Method::GET, |_req, _params| async {
            Err(Error::InternalError("boom".to_string()))
        }).unwrap();
        router
    }

    fn handler(read_buffer_size: usize) -> ConnectionHandler {
        ConnectionHandler::new(Arc::new(test_router()), read_buffer_size)
    }

    /// Run one request through the connection handler and return what was written.
    async fn exchange(request: &[u8], read_buffer_size: usize) -> (Result<(), Error>, Vec<u8>) {
        let mut stream = MockTcpStream::new(request.to_vec());
        let result = handler(read_buffer_size).service(&mut stream).await;
        (result, stream.written_data().to_vec())
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = HttpServer::bind_to("127.0.0.1", 8080);
        assert_eq!(server.config.addr(), "127.0.0.1:8080");
        assert_eq!(server.config.workers, 10);
        assert!(server.resource_directory().is_none());
        assert!(server.router().is_empty());
    }

    #[tokio::test]
    async fn test_add_route() {
        let mut server = HttpServer::new(ServerConfig::default());

        server
            .add_route("/test", Method::GET, |_req, _params| async {
                Ok(HttpResponse::new(StatusCode::Ok))
            })
            .unwrap()
            .add_route("/test", Method::POST, |_req, _params| async {
                Ok(HttpResponse::new(StatusCode::Created))
            })
            .unwrap();

        let routes = server.router().routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].template, "/test");
        assert_eq!(routes[0].method, Method::GET);
        assert_eq!(routes[1].method, Method::POST);
    }

    #[tokio::test]
    async fn test_add_duplicate_route_fails() {
        let mut server = HttpServer::new(ServerConfig::default());
        server.add_route("/files/<name>", Method::GET, echo).unwrap();

        let result = server.add_route("/files/<other>", Method::GET, echo);
        assert!(matches!(result, Err(Error::DuplicateRoute { .. })));
    }

    #[tokio::test]
    async fn test_handle_connection_with_valid_request() {
        let (result, written) = exchange(b"GET /echo/hello HTTP/1.1\r\nHost: localhost\r\n\r\n", 1024).await;

        assert!(result.is_ok());
        assert_eq!(
            written,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello"
        );
    }

    #[tokio::test]
    async fn test_handle_connection_with_not_found() {
        let (result, written) = exchange(b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n", 1024).await;

        assert!(result.is_ok());
        assert_eq!(written, b"HTTP/1.1 404 Not Found\r\n\r\n");
    }

    #[tokio::test]
    async fn test_wrong_method_is_not_found() {
        let (result, written) = exchange(b"POST /echo/hello HTTP/1.1\r\n\r\n", 1024).await;

        assert!(result.is_ok());
        assert_eq!(written, b"HTTP/1.1 404 Not Found\r\n\r\n");
    }

    #[tokio::test]
    async fn test_handle_connection_with_invalid_request() {
        let (result, written) = exchange(b"INVALID /echo/hello HTTP/1.1\r\n\r\n", 1024).await;

        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(written.is_empty(), "malformed requests get no response");
    }

    #[tokio::test]
    async fn test_handle_connection_without_head_terminator() {
        let (result, written) = exchange(b"GET / HTTP/1.1\r\nHost: localhost\r\n", 1024).await;

        assert!(matches!(result, Err(Error::ParseError(crate::parser::Error::MalformedRequest))));
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_peer_closed_without_request() {
        let (result, written) = exchange(b"", 1024).await;

        assert!(result.is_ok());
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_is_internal_server_error() {
        let (result, written) = exchange(b"GET /fail HTTP/1.1\r\n\r\n", 1024).await;

        assert!(result.is_ok());
        assert_eq!(written, b"HTTP/1.1 500 Internal Server Error\r\n\r\n");
    }

    #[tokio::test]
    async fn test_single_receive_limits_request() {
        // The head does not fit in one receive, so the request never decodes
        let (result, written) = exchange(b"GET /echo/hello HTTP/1.1\r\nHost: localhost\r\n\r\n", 16).await;
        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(written.is_empty());

        // Body bytes past the receive limit are never read
        let request = b"POST /upload HTTP/1.1\r\n\r\n0123456789";
        let limit = request.len() - 4;
        let (result, written) = exchange(request, limit).await;
        assert!(result.is_ok());
        assert_eq!(written, b"HTTP/1.1 201 Created\r\nContent-Length: 6\r\n\r\n012345");
    }

    #[tokio::test]
    async fn test_zero_read_buffer_still_receives() {
        // A zero-length read would look like a closed peer
        let (result, written) = exchange(b"GET / HTTP/1.1\r\n\r\n", 0).await;
        assert!(matches!(result, Err(Error::ParseError(crate::parser::Error::MalformedRequest))));
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_routes() {
        let (_, root) = exchange(b"GET / HTTP/1.1\r\n\r\n", 1024).await;
        assert_eq!(root, b"HTTP/1.1 200 OK\r\n\r\n");

        let (_, upload) = exchange(b"POST /upload HTTP/1.1\r\n\r\npayload", 1024).await;
        assert_eq!(upload, b"HTTP/1.1 201 Created\r\nContent-Length: 7\r\n\r\npayload");
    }

    async fn start_server(server: HttpServer) -> (std::net::SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<(), Error>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.serve_with_shutdown(listener, async move {
            let _ = shutdown_rx.await;
        }));

        (addr, shutdown_tx, handle)
    }

    async fn send_request(addr: std::net::SocketAddr, request: String) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        // The server closes the connection after one response
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_concurrent_clients_get_their_own_responses() {
        let mut server = HttpServer::new(ServerConfig::new("127.0.0.1", 0).with_workers(4));
        server.add_route("/echo/<to_echo>", Method::GET, |req, params| async move {
            // Stagger completion so responses interleave
            let delay = req.target.len() as u64 % 5;
            time::sleep(Duration::from_millis(delay * 5)).await;
            echo(req, params).await
        }).unwrap();

        let (addr, shutdown_tx, handle) = start_server(server).await;

        let mut clients = Vec::new();
        for i in 0..20 {
            clients.push(tokio::spawn(async move {
                let value = format!("client-{i}-{}", "x".repeat(i));
                let response = send_request(addr, format!("GET /echo/{value} HTTP/1.1\r\nHost: localhost\r\n\r\n")).await;
                (value, response)
            }));
        }

        for client in clients {
            let (value, response) = client.await.unwrap();
            let expected = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{value}",
                value.len()
            );
            assert_eq!(String::from_utf8(response).unwrap(), expected);
        }

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut server = HttpServer::new(ServerConfig::new("127.0.0.1", 0).with_workers(2));
        {
            let active = active.clone();
            let peak = peak.clone();
            server.add_route("/slow", Method::GET, move |_req, _params| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(HttpResponse::new(StatusCode::Ok))
                }
            }).unwrap();
        }

        let (addr, shutdown_tx, handle) = start_server(server).await;

        let clients: Vec<_> = (0..6)
            .map(|_| tokio::spawn(send_request(addr, "GET /slow HTTP/1.1\r\n\r\n".to_string())))
            .collect();

        // Every queued connection is eventually serviced
        for client in clients {
            assert_eq!(client.await.unwrap(), b"HTTP/1.1 200 OK\r\n\r\n");
        }

        assert!(peak.load(Ordering::SeqCst) <= 2, "more handlers ran than workers");
        assert_eq!(active.load(Ordering::SeqCst), 0);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_closes_without_response() {
        let mut server = HttpServer::new(ServerConfig::new("127.0.0.1", 0));
        server.add_route("/", Method::GET, |_req, _params| async {
            Ok(HttpResponse::new(StatusCode::Ok))
        }).unwrap();

        let (addr, shutdown_tx, handle) = start_server(server).await;

        let response = send_request(addr, "BREW / HTTP/1.1\r\n\r\n".to_string()).await;
        assert!(response.is_empty());

        // The server keeps serving other clients
        let response = send_request(addr, "GET / HTTP/1.1\r\n\r\n".to_string()).await;
        assert_eq!(response, b"HTTP/1.1 200 OK\r\n\r\n");

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_graceful_shutdown_waits_for_active_connections() {
        let mut server = HttpServer::new(ServerConfig::new("127.0.0.1", 0));
        server.add_route("/slow", Method::GET, |_req, _params| async {
            time::sleep(Duration::from_millis(100)).await;
            Ok(HttpResponse::new(StatusCode::Ok).with_body_string("done"))
        }).unwrap();

        let (addr, shutdown_tx, handle) = start_server(server).await;

        let client = tokio::spawn(send_request(addr, "GET /slow HTTP/1.1\r\n\r\n".to_string()));

        // Let the request reach its handler before shutting down
        time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let response = client.await.unwrap();
        assert!(response.ends_with(b"\r\n\r\ndone"));

        // The listener is closed once the server has stopped
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let server = HttpServer::bind_to("127.0.0.1", port);
        let result = server.run().await;

        assert!(matches!(result, Err(Error::Bind { ref addr, .. }) if *addr == format!("127.0.0.1:{port}")));
    }
}
