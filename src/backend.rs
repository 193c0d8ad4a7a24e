//! Backend definitions and their caller-relative (localized) views.

use serde::Deserialize;

/// One registered web application.
///
/// Deserialized from one entry of the registry file:
///
/// ```yaml
/// - name: ipython
///   url: http://localhost:8888
///   subdomain: ipython
///   image: images/ipython.png
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BackendDefinition {
    name: String,
    subdomain: String,
    #[serde(rename = "url")]
    backend_url: String,
    #[serde(rename = "image", default)]
    image_url: String,
    /// Only meaningful on a localized copy.
    #[serde(rename = "default_domain", default)]
    advertised_domain: String,
}

impl BackendDefinition {
    pub fn new(
        name: impl Into<String>,
        subdomain: impl Into<String>,
        backend_url: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            subdomain: subdomain.into(),
            backend_url: backend_url.into(),
            image_url: image_url.into(),
            advertised_domain: String::new(),
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn subdomain(&self) -> &str { &self.subdomain }
    pub fn backend_url(&self) -> &str { &self.backend_url }
    pub fn image_url(&self) -> &str { &self.image_url }
    pub fn advertised_domain(&self) -> &str { &self.advertised_domain }

    /// Returns a copy advertised under `domain`. `self` is left as is.
    pub fn localize(&self, domain: &str) -> Self {
        Self {
            advertised_domain: domain.to_owned(),
            ..self.clone()
        }
    }

    /// The public address of this backend: `http://<subdomain>.<advertised domain>`.
    pub fn advertised_url(&self) -> String {
        format!("http://{}.{}", self.subdomain, self.advertised_domain)
    }

    /// Whether a raw `Host` value addresses this backend.
    ///
    /// See [`subdomain_token`](crate::matcher::subdomain_token) for how the
    /// label is picked out of the host.
    pub fn can_handle(&self, host: &str) -> bool {
        crate::matcher::subdomain_token(host) == Some(self.subdomain.as_str())
    }
}
