//! Host dispatch: one entry point for every request the server accepts.
//!
//! A request whose host names a registered backend goes to the proxy route,
//! whatever its path. Anything else is addressed to subproxy itself and is
//! looked up in the apex [`Router`]. Hosts like `example.com:8000` or
//! `127.0.0.1:8000` have a third-from-last label too, but unless it names a
//! backend they still reach discovery and the health checks.

use std::sync::Arc;

use http::StatusCode;

use crate::error::ProxyError;
use crate::health;
use crate::matcher;
use crate::method::Method;
use crate::registry::Registry;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::Router;

/// Path of the discovery document on the apex host.
pub const DISCOVERY_PATH: &str = "/webapps";

/// The proxy's request handler.
pub struct Gateway {
    registry: Arc<Registry>,
    apex: Router,
}

impl Gateway {
    /// Builds the gateway with the standard apex routes: discovery at
    /// [`DISCOVERY_PATH`] plus `/healthz` and `/readyz`.
    pub fn new(registry: Arc<Registry>) -> Self {
        let discovery = {
            let registry = Arc::clone(&registry);
            move |req: Request| {
                let registry = Arc::clone(&registry);
                async move { registry.discovery(req.host().unwrap_or_default()) }
            }
        };

        let apex = Router::new()
            .on(Method::Get, DISCOVERY_PATH, discovery)
            .on(Method::Get, "/healthz", health::liveness)
            .on(Method::Get, "/readyz", health::readiness);

        Self { registry, apex }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn handle(&self, req: Request) -> Response {
        let is_backend = req.host().is_some_and(|host| self.registry.find_by_host(host).is_some());
        if is_backend {
            return self.registry.route(req).await;
        }

        let route = Method::try_from(req.method())
            .ok()
            .and_then(|method| self.apex.lookup(method, req.path()));
        if let Some(handler) = route {
            return handler.call(req).await;
        }

        // Neither a backend nor an apex route. A host that looked like it
        // carried a subdomain gets told which one was missing.
        match req.host().and_then(matcher::subdomain_token) {
            Some(token) => ProxyError::NotFound(token.to_owned()).into_response(),
            None => Response::status(StatusCode::NOT_FOUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::empty;
    use http_body_util::BodyExt;

    fn gateway() -> Gateway {
        let registry = Registry::from_yaml(
            "- {name: mongs, url: 'http://127.0.0.1:9', subdomain: mongs, image: images/mongo.png}\n",
        )
        .unwrap();
        Gateway::new(Arc::new(registry))
    }

    fn get(host: &str, path: &str) -> Request {
        Request::new(
            http::Request::builder()
                .uri(path)
                .header("host", host)
                .body(empty())
                .unwrap(),
        )
    }

    async fn body_string(res: Response) -> String {
        let bytes = res.into_inner().into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn discovery_uses_the_callers_host() {
        let res = gateway().handle(get("localhost:8000", "/webapps")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(
            body_string(res).await,
            r#"[{"name":"mongs","url":"http://mongs.localhost:8000","image":"images/mongo.png"}]"#
        );
    }

    #[tokio::test]
    async fn health_checks_answer_on_the_apex() {
        let res = gateway().handle(get("localhost:8000", "/healthz")).await;
        assert_eq!(body_string(res).await, "ok");
        let res = gateway().handle(get("localhost:8000", "/readyz")).await;
        assert_eq!(body_string(res).await, "ready");
    }

    #[tokio::test]
    async fn unknown_apex_path_is_404() {
        let res = gateway().handle(get("localhost:8000", "/index.html")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_subdomain_explains_itself() {
        let res = gateway().handle(get("nope.example.com", "/natasha")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(res).await, "could not find a web application for nope");
    }

    #[tokio::test]
    async fn apex_routes_answer_on_ported_and_numeric_hosts() {
        for host in ["example.com:8000", "127.0.0.1:8000", "192.168.1.5", "nope.example.com"] {
            let res = gateway().handle(get(host, "/webapps")).await;
            assert_eq!(res.status_code(), StatusCode::OK, "host {host}");
            assert_eq!(
                body_string(res).await,
                format!(r#"[{{"name":"mongs","url":"http://mongs.{host}","image":"images/mongo.png"}}]"#)
            );

            let res = gateway().handle(get(host, "/healthz")).await;
            assert_eq!(body_string(res).await, "ok", "host {host}");
        }
    }

    #[tokio::test]
    async fn registered_subdomain_wins_over_apex_paths() {
        // Nothing listens on port 9, so a forwarded request fails upstream.
        let res = gateway().handle(get("mongs.example.com", "/webapps")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
