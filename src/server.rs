//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server stops accepting, asks every open
//! connection to finish its in-flight request and close, waits for them, then
//! returns from [`Server::serve`]. Idle keep-alive connections do not hold
//! shutdown up.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::gateway::Gateway;
use crate::request::Request;
use crate::response::Body;

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Binds a listener on `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        Ok(Self { listener: TcpListener::bind(addr).await? })
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections and dispatches them through `gateway` until a
    /// shutdown signal arrives and every in-flight connection has finished.
    pub async fn serve(self, gateway: Gateway) -> Result<(), Error> {
        self.serve_with_shutdown(gateway, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `shutdown`
    /// resolves instead of on a process signal.
    pub async fn serve_with_shutdown(
        self,
        gateway: Gateway,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr = self.listener.local_addr()?;

        // One gateway for every connection task; only the Arc is cloned per
        // request.
        let gateway = Arc::new(gateway);

        info!(%addr, backends = gateway.registry().len(), "subproxy listening");

        // `auto::Builder` speaks HTTP/1.1 and HTTP/2, whichever the client
        // negotiates. Built once; each connection gets an owned clone.
        let builder = ConnBuilder::new(TokioExecutor::new());

        // Every connection is registered here so shutdown can tell it to stop
        // taking new requests. Idle keep-alive connections close right away,
        // busy ones after their in-flight response.
        let graceful = GracefulShutdown::new();

        let mut tasks = tokio::task::JoinSet::new();

        // The shutdown future is polled across loop iterations, so it has to
        // stay put in memory.
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a queued backlog of connections
                // cannot delay it.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    // hyper has its own IO traits; TokioIo bridges tokio's.
                    let io = TokioIo::new(stream);

                    // Called once per request on the connection.
                    let gateway = Arc::clone(&gateway);
                    let svc = service_fn(move |req| {
                        let gateway = Arc::clone(&gateway);
                        async move { dispatch(&gateway, req, remote_addr).await }
                    });

                    let conn = graceful.watch(builder.serve_connection(io, svc).into_owned());
                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections so the set does not grow for the
                // life of the process.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("subproxy stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Every failure becomes a response inside the gateway, so hyper never sees
/// an error from the service.
async fn dispatch(
    gateway: &Gateway,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Body>, std::convert::Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = gateway.handle(Request::new(req.map(|b| b.boxed_unsync()))).await;

    debug!(peer = %remote_addr, %method, %path, status = response.status_code().as_u16(), "request");
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or SIGINT (Ctrl-C). Only Ctrl-C on non-Unix targets.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
