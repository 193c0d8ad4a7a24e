//! Error types.
//!
//! Two families live here. [`Error`] covers the things that stop the process
//! from starting or serving: reading the registry file, parsing it, validating
//! it, binding the listener. [`ProxyError`] covers the ways a single request
//! can fail. A `ProxyError` never escapes the request it belongs to; it is
//! turned into an HTTP [`Response`](crate::Response) and the server moves on.

use thiserror::Error;

use crate::response::{IntoResponse, Response};

/// Infrastructure failure returned by subproxy's fallible startup operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("duplicate subdomain `{0}` in registry")]
    DuplicateSubdomain(String),

    #[error("backend `{subdomain}` has an empty name")]
    EmptyName { subdomain: String },

    #[error("invalid subdomain `{0}`: expected a single DNS label")]
    InvalidSubdomain(String),

    #[error("backend `{subdomain}` has an invalid url `{url}`: {reason}")]
    InvalidBackendUrl {
        subdomain: String,
        url: String,
        reason: String,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a single proxied request could not be served.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("could not find a web application for {0}")]
    NotFound(String),

    #[error("method {0} is not yet available")]
    UnsupportedMethod(String),

    #[error("could not build upstream request: {0}")]
    UpstreamBuild(#[from] http::Error),

    #[error("upstream request failed: {0}")]
    UpstreamCall(#[from] hyper_util::client::legacy::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound(_) => http::StatusCode::NOT_FOUND,
            Self::UnsupportedMethod(_) | Self::UpstreamBuild(_) | Self::UpstreamCall(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Response::builder().status(status).text(self.to_string())
    }
}
