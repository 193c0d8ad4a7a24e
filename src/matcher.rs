//! Subdomain matching.
//!
//! A host is cut into labels on `.` and `:`; the routing token is always the
//! third label from the end. That covers `app.example.com`, `app.localhost:8000`
//! and anything else where exactly two labels follow the subdomain. Note that
//! a port counts as a label: in `app.example.com:8000` the token is `example`.

use crate::backend::BackendDefinition;

/// Picks the routing token out of a raw `Host` value.
///
/// Empty labels are skipped. Returns `None` for hosts with fewer than three
/// labels.
///
/// ```rust
/// use subproxy::matcher::subdomain_token;
///
/// assert_eq!(subdomain_token("foo.bigtits.com"), Some("foo"));
/// assert_eq!(subdomain_token("foo.localhost:8000"), Some("foo"));
/// assert_eq!(subdomain_token("bigtits.com"), None);
/// ```
pub fn subdomain_token(host: &str) -> Option<&str> {
    let labels: Vec<&str> = host
        .split(['.', ':'])
        .filter(|label| !label.is_empty())
        .collect();
    labels.len().checked_sub(3).map(|i| labels[i])
}

/// Returns the first backend whose subdomain equals `token` exactly.
pub fn find<'a>(backends: &'a [BackendDefinition], token: &str) -> Option<&'a BackendDefinition> {
    backends.iter().find(|b| b.subdomain() == token)
}
