//! The registry of backends and the two operations built on it.
//!
//! A [`Registry`] is built once at startup, either from YAML or from an
//! already-parsed list, and is read-only afterwards. Request tasks share it
//! through an `Arc` without locking.

use std::path::Path;

use tracing::{info, warn};

use crate::backend::BackendDefinition;
use crate::discovery;
use crate::error::{Error, ProxyError, Result};
use crate::forward::Forwarder;
use crate::matcher;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The ordered, immutable set of registered backends.
pub struct Registry {
    backends: Box<[BackendDefinition]>,
    forwarder: Forwarder,
}

impl Registry {
    /// Validates `backends` and builds a registry that forwards with a
    /// default [`Forwarder`].
    ///
    /// Rejects empty names, subdomains that are not a single label, backend
    /// URLs without a scheme and authority, and subdomains that appear twice.
    pub fn new(backends: Vec<BackendDefinition>) -> Result<Self> {
        Self::with_forwarder(backends, Forwarder::new())
    }

    pub fn with_forwarder(backends: Vec<BackendDefinition>, forwarder: Forwarder) -> Result<Self> {
        for (i, b) in backends.iter().enumerate() {
            validate(b)?;
            if backends[..i].iter().any(|seen| seen.subdomain() == b.subdomain()) {
                return Err(Error::DuplicateSubdomain(b.subdomain().to_owned()));
            }
        }
        Ok(Self { backends: backends.into_boxed_slice(), forwarder })
    }

    /// Parses a YAML sequence of backend entries.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let backends: Vec<BackendDefinition> = serde_yaml::from_str(yaml)?;
        Self::new(backends)
    }

    /// Reads and parses the registry file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let registry = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), backends = registry.len(), "registry loaded");
        Ok(registry)
    }

    pub fn backends(&self) -> &[BackendDefinition] { &self.backends }
    pub fn len(&self) -> usize { self.backends.len() }
    pub fn is_empty(&self) -> bool { self.backends.is_empty() }

    /// The backend registered under `token`.
    pub fn find(&self, token: &str) -> Result<&BackendDefinition, ProxyError> {
        matcher::find(&self.backends, token).ok_or_else(|| ProxyError::NotFound(token.to_owned()))
    }

    /// The backend addressed by a raw `Host` value, port and all.
    pub fn find_by_host(&self, host: &str) -> Option<&BackendDefinition> {
        self.backends.iter().find(|b| b.can_handle(host))
    }

    /// Proxies `req` to the backend named by the subdomain of its host.
    pub async fn route(&self, req: Request) -> Response {
        let token = req.host().and_then(matcher::subdomain_token).unwrap_or_default().to_owned();
        self.route_to(&token, req).await
    }

    /// Proxies `req` to the backend registered under `token`, for callers
    /// that extracted the subdomain themselves.
    pub async fn route_to(&self, token: &str, req: Request) -> Response {
        let backend = match self.find(token) {
            Ok(backend) => backend,
            Err(e) => {
                info!(subdomain = token, "no backend registered");
                return e.into_response();
            }
        };

        match self.forwarder.forward(backend, req).await {
            Ok(res) => res,
            Err(e) => {
                warn!(subdomain = token, backend = backend.backend_url(), "proxy error: {e}");
                e.into_response()
            }
        }
    }

    /// Copies of every backend, advertised under `domain`, in registry order.
    pub fn localize(&self, domain: &str) -> Vec<BackendDefinition> {
        self.backends.iter().map(|b| b.localize(domain)).collect()
    }

    /// The discovery document for a caller that reached us as `domain`.
    pub fn discovery(&self, domain: &str) -> Response {
        match discovery::to_json(&self.localize(domain)) {
            Ok(bytes) => Response::json(bytes),
            Err(e) => {
                warn!("discovery serialization failed: {e}");
                Response::status(http::StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn validate(b: &BackendDefinition) -> Result<()> {
    let subdomain = b.subdomain();
    let is_label = !subdomain.is_empty()
        && subdomain.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !is_label {
        return Err(Error::InvalidSubdomain(subdomain.to_owned()));
    }
    if b.name().trim().is_empty() {
        return Err(Error::EmptyName { subdomain: subdomain.to_owned() });
    }

    let invalid = |reason: &str| Error::InvalidBackendUrl {
        subdomain: subdomain.to_owned(),
        url: b.backend_url().to_owned(),
        reason: reason.to_owned(),
    };
    let uri: http::Uri = b.backend_url().parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(invalid("expected scheme and host"));
    }
    if uri.query().is_some() {
        return Err(invalid("query strings are not allowed in a base url"));
    }
    Ok(())
}
