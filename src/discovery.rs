//! Discovery view: the public face of the registry.

use serde::Serialize;

use crate::backend::BackendDefinition;

/// What a caller learns about one backend. Backend URL and subdomain are
/// never part of it.
#[derive(Debug, Serialize)]
struct Entry<'a> {
    name: &'a str,
    url: String,
    image: &'a str,
}

impl<'a> From<&'a BackendDefinition> for Entry<'a> {
    fn from(b: &'a BackendDefinition) -> Self {
        Self { name: b.name(), url: b.advertised_url(), image: b.image_url() }
    }
}

/// Serializes already-localized backends as a JSON array, in order.
pub fn to_json(localized: &[BackendDefinition]) -> serde_json::Result<Vec<u8>> {
    let entries: Vec<Entry<'_>> = localized.iter().map(Entry::from).collect();
    serde_json::to_vec(&entries)
}
