//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::signal;
use log::{debug, error, info, warn};

use crate::parser::{HttpRequest, Method};
use crate::server::config::ServerConfig;
use crate::server::connection::ConnectionHandler;
use crate::server::error::Error;
use crate::server::response::HttpResponse;
use crate::server::router::{Params, Router};

/// An HTTP server.
///
/// Routes are registered on the server before it starts; once running, the
/// route table is shared read-only between connection tasks.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
        }
    }

    /// Create a server for a host and port with default settings.
    pub fn bind_to(host: impl Into<String>, port: u16) -> Self {
        Self::new(ServerConfig::new(host, port))
    }

    /// Directory configured for file-serving routes, if any.
    pub fn resource_directory(&self) -> Option<&Path> {
        self.config.resource_directory.as_deref()
    }

    /// Add a route to the server.
    ///
    /// Fails with [`Error::DuplicateRoute`] when the method and compiled
    /// template are already taken.
    pub fn add_route<F, Fut>(&mut self, template: &str, method: Method, handler: F) -> Result<&mut Self, Error>
    where
        F: Fn(HttpRequest, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.router.register(template, method, handler)?;
        Ok(self)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Freeze the route table into the handler shared by connection tasks.
    pub fn into_connection_handler(self) -> ConnectionHandler {
        ConnectionHandler::new(Arc::new(self.router), self.config.read_buffer_size)
    }

    /// Display the registered endpoints.
    fn display_server_info(&self) {
        info!("Registered endpoints:");
        for route in self.router.routes() {
            info!("  {method} {template}", method = route.method, template = route.template);
        }
        if let Some(directory) = self.resource_directory() {
            info!("Serving files from {}", directory.display());
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| Error::Bind { addr: addr.clone(), source })?;
        info!("Server running and accepting connections at http://{addr}");
        Ok(listener)
    }

    /// Handle a new connection.
    ///
    /// The connection is queued as a task that waits for a worker permit, so
    /// the accept loop never waits on a busy pool.
    fn handle_new_connection(
        socket: TcpStream,
        addr: SocketAddr,
        workers: Arc<Semaphore>,
        handler: ConnectionHandler,
        tasks: &mut JoinSet<()>,
    ) {
        debug!("Connection established with {addr}");

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the worker slot
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };

            if let Err(e) = handler.service(socket).await {
                match e {
                    Error::ParseError(_) => debug!("Connection from {addr} dropped: {e}"),
                    _ => warn!("Error handling connection from {addr}: {e}"),
                }
            }
        });
    }

    /// Handle accept errors. The accept loop keeps running.
    async fn handle_accept_error(e: std::io::Error) {
        error!("Error accepting connection: {e}");
        // Wait a bit before retrying, accept errors such as EMFILE tend to repeat
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>, timeout: std::time::Duration) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let drained = tokio::time::timeout(timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout reached, aborting {len} connections", len = tasks.len());
            tasks.shutdown().await;
        }

        info!("Server shutdown complete");
    }

    /// Bind the configured address and serve until Ctrl+C.
    ///
    /// Returns [`Error::Bind`] if the listening socket cannot be set up.
    pub async fn run(self) -> Result<(), Error> {
        self.display_server_info();
        let listener = self.setup_listener().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until Ctrl+C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        self.serve_with_shutdown(listener, async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                    // Without a signal handler the server runs until the process ends
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Serve connections from `listener` until `shutdown` completes.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let workers = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let shutdown_timeout = self.config.shutdown_timeout();
        let handler = self.into_connection_handler();

        // Use JoinSet to keep track of all spawned tasks
        let mut tasks = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }

                // Reap finished connection tasks
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(
                                socket,
                                addr,
                                workers.clone(),
                                handler.clone(),
                                &mut tasks,
                            );
                        }
                        Err(e) => Self::handle_accept_error(e).await,
                    }
                }
            }
        }

        drop(listener);
        Self::perform_shutdown(&mut tasks, shutdown_timeout).await;

        Ok(())
    }
}
