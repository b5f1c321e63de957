//! Status endpoint.
//!
//! Serves `GET /status` over HTTP so a web frontend can show live button
//! levels and the printer state. Routing is a plain function so it can be
//! exercised without a socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tiny_http::{Header, Request, Response, Server};

use crate::core::ButtonDispatcher;

/// How long the server waits for a request before re-checking shutdown.
const RECV_TIMEOUT: Duration = Duration::from_millis(200);

/// API error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Could not bind {addr}: {message}")]
    Bind { addr: String, message: String },
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::Bind { .. } => 500,
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A rendered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
        Self { status, body }
    }

    fn error(error: &ApiError) -> Self {
        Self::json(error.status_code(), &ErrorResponse { error: error.to_string() })
    }
}

/// API routes.
pub mod routes {
    /// Route: GET /status
    pub const STATUS: &str = "/status";
}

/// Handle one request.
pub fn route(method: &str, url: &str, dispatcher: &ButtonDispatcher) -> ApiResponse {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path) {
        ("GET", routes::STATUS) => ApiResponse::json(200, &dispatcher.status()),
        (_, routes::STATUS) => ApiResponse::error(&ApiError::MethodNotAllowed(method.to_string())),
        _ => ApiResponse::error(&ApiError::NotFound(path.to_string())),
    }
}

/// HTTP server for the status endpoint.
pub struct StatusServer {
    server: Arc<Server>,
    dispatcher: Arc<ButtonDispatcher>,
}

impl std::fmt::Debug for StatusServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusServer").field("addr", &self.local_addr()).finish()
    }
}

impl StatusServer {
    /// Bind to `addr` (`host:port`; port 0 picks a free one).
    pub fn bind(addr: &str, dispatcher: Arc<ButtonDispatcher>) -> ApiResult<Self> {
        let server = Server::http(addr)
            .map_err(|e| ApiError::Bind { addr: addr.to_string(), message: e.to_string() })?;
        Ok(Self { server: Arc::new(server), dispatcher })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve requests until `shutdown` is set.
    pub fn serve(&self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            match self.server.recv_timeout(RECV_TIMEOUT) {
                Ok(Some(request)) => self.handle(request),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Status server receive failed: {}", e);
                    thread::sleep(RECV_TIMEOUT);
                }
            }
        }
    }

    /// Serve on a background thread until `shutdown` is set.
    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
        thread::spawn(move || {
            if let Some(addr) = self.local_addr() {
                tracing::info!("Status endpoint listening on http://{}{}", addr, routes::STATUS);
            }
            self.serve(&shutdown);
            tracing::debug!("Status server stopped");
        })
    }

    fn handle(&self, request: Request) {
        let response = route(request.method().as_str(), request.url(), &self.dispatcher);
        tracing::debug!(
            method = %request.method(),
            url = request.url(),
            status = response.status,
            "Status request"
        );

        let mut reply =
            Response::from_data(response.body.into_bytes()).with_status_code(response.status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
            reply = reply.with_header(header);
        }
        if let Err(e) = request.respond(reply) {
            tracing::debug!("Could not send status response: {}", e);
        }
    }
}
