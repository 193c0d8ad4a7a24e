//! Incoming HTTP request type.

use crate::response::Body;

/// An incoming HTTP request.
///
/// The body is left untouched as a stream so the proxy route can hand it to
/// the backend without reading it into memory.
pub struct Request(http::Request<Body>);

impl Request {
    pub fn new(inner: http::Request<Body>) -> Self {
        Self(inner)
    }

    pub fn method(&self) -> &http::Method { self.0.method() }
    pub fn path(&self) -> &str { self.0.uri().path() }
    pub fn headers(&self) -> &http::HeaderMap { self.0.headers() }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.0.uri().query()
    }

    /// The host the caller addressed, port included when present.
    ///
    /// Prefers the `Host` header (HTTP/1.1) and falls back to the URI
    /// authority, which is where HTTP/2 and absolute-form requests carry it.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
            .filter(|h| !h.is_empty())
            .or_else(|| self.0.uri().authority().map(|a| a.as_str()))
    }

    /// Case-insensitive header lookup. Returns the first value if it is visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn into_inner(self) -> http::Request<Body> {
        self.0
    }
}
