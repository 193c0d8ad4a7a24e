//! # subproxy
//!
//! A reverse proxy that puts several web applications behind one domain, one
//! subdomain each, and tells callers where to find them.
//!
//! ## Routing
//!
//! Every request is dispatched on its `Host`. The host is cut into labels on
//! `.` and `:` and the third label from the end picks the backend:
//!
//! | Host | Token |
//! |---|---|
//! | `ipython.example.com` | `ipython` |
//! | `ipython.localhost:8000` | `ipython` |
//! | `localhost:8000` | none, served by subproxy itself |
//!
//! A request whose token names a backend is forwarded to it: same method, path,
//! query, headers and body. The backend's status, headers and body come back
//! unchanged, except that repeated headers are folded into one value joined
//! by `;`. Only `GET`, `POST` and `PUT` are forwarded.
//!
//! Every other request is served from the apex routes: `GET /webapps`
//! returns the discovery document, `GET /healthz` and `GET /readyz` answer
//! health checks. A token that matches no backend and no apex route gets a
//! 404 naming it.
//!
//! ## Discovery
//!
//! `GET /webapps` lists every backend as `{name, url, image}`, where `url` is
//! rebuilt from the caller's own host. A caller that reached the proxy as
//! `localhost:8000` sees `http://ipython.localhost:8000`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subproxy::{Gateway, Registry, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), subproxy::Error> {
//!     let registry = Registry::load("webapps.yml")?;
//!     let server = Server::bind("0.0.0.0:8000".parse().unwrap()).await?;
//!     server.serve(Gateway::new(Arc::new(registry))).await
//! }
//! ```

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod backend;
pub mod discovery;
pub mod forward;
pub mod gateway;
pub mod health;
pub mod matcher;
pub mod registry;

pub use backend::BackendDefinition;
pub use error::{Error, ProxyError, Result};
pub use forward::Forwarder;
pub use gateway::Gateway;
pub use handler::Handler;
pub use method::Method;
pub use registry::Registry;
pub use request::Request;
pub use response::{Body, IntoResponse, Response, ResponseBuilder, empty, full};
pub use router::Router;
pub use server::Server;
