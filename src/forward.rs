//! Request forwarding.
//!
//! # Header folding
//!
//! When a header appears more than once, its values are joined with `;` and
//! sent as a single header. This is applied in both directions. It is lossy
//! for headers like `set-cookie` whose values cannot be recombined; callers
//! that depend on repeated headers will see one folded value instead.
//!
//! # Cancellation
//!
//! Nothing here spawns. The outbound call runs inside the future hyper polls
//! for the inbound request, and the backend body is streamed inside the
//! response body hyper writes. If the caller disconnects, hyper drops both,
//! which drops the pending client call or the backend connection with them.

use http::header::{HOST, HeaderMap, HeaderValue};
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::backend::BackendDefinition;
use crate::error::ProxyError;
use crate::method::Method;
use crate::request::Request;
use crate::response::{Body, Response};

/// Pooled HTTP/1.1 client used to reach backends.
pub type HttpClient = Client<HttpConnector, Body>;

/// Sends requests to backends and relays their responses.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
}

impl Forwarder {
    pub fn new() -> Self {
        Self::with_client(Client::builder(TokioExecutor::new()).build_http())
    }

    /// Uses a preconfigured client, e.g. one with connect timeouts set on its
    /// connector.
    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }

    /// Forwards `req` to `backend` and returns the backend's response.
    ///
    /// Only `GET`, `POST` and `PUT` are forwarded; anything else fails with
    /// [`ProxyError::UnsupportedMethod`] before a connection is opened.
    pub async fn forward(
        &self,
        backend: &BackendDefinition,
        req: Request,
    ) -> Result<Response, ProxyError> {
        let method = Method::try_from(req.method())
            .ok()
            .filter(|m| m.is_forwarded())
            .ok_or_else(|| ProxyError::UnsupportedMethod(req.method().to_string()))?;

        let target = target_url(backend.backend_url(), req.path(), req.query());
        let (parts, body) = req.into_inner().into_parts();

        let mut outbound = http::Request::builder()
            .method(http::Method::from(method))
            .uri(&target);
        if let Some(headers) = outbound.headers_mut() {
            fold_headers(&parts.headers, headers);
            // The client derives Host from the target authority.
            headers.remove(HOST);
        }
        let outbound = outbound.body(body)?;

        debug!(%method, %target, "forwarding");
        let upstream = self.client.request(outbound).await?;
        debug!(status = upstream.status().as_u16(), %target, "upstream responded");

        let (parts, body) = upstream.into_parts();
        let mut relayed = http::Response::new(body.boxed_unsync());
        fold_headers(&parts.headers, relayed.headers_mut());
        *relayed.status_mut() = parts.status;
        Ok(Response::from_http(relayed))
    }
}

impl Default for Forwarder {
    fn default() -> Self { Self::new() }
}

/// `base + path`, with `?query` appended only when the query is non-empty.
fn target_url(base: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
        _ => format!("{base}{path}"),
    }
}

/// Copies every header from `from` into `to`, one value per name, with
/// repeated values joined by `;`.
fn fold_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for name in from.keys() {
        let mut joined = Vec::new();
        for (i, value) in from.get_all(name).iter().enumerate() {
            if i > 0 {
                joined.push(b';');
            }
            joined.extend_from_slice(value.as_bytes());
        }
        match HeaderValue::from_bytes(&joined) {
            Ok(value) => {
                to.insert(name.clone(), value);
            }
            Err(e) => warn!(header = %name, "dropping unfoldable header: {e}"),
        }
    }
}
