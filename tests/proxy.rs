//! End-to-end forwarding against live backends on loopback.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use subproxy::{BackendDefinition, Body, Gateway, Registry, Request, Server, empty, full};

// ── Backend under test ────────────────────────────────────────────────────────

fn header(req: &hyper::Request<Incoming>, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

async fn backend(req: hyper::Request<Incoming>) -> Result<http::Response<Body>, Infallible> {
    let path = req.uri().path().to_owned();
    let res = match path.as_str() {
        "/natasha" => http::Response::new(full("hello world\n")),
        "/bogus" => http::Response::new(full(header(&req, "bogus"))),
        "/set-bogus" => http::Response::builder()
            .header("bogus", "has been set on the server")
            .body(full(header(&req, "bogus")))
            .unwrap(),
        "/double" => http::Response::builder()
            .header("x-multi", "a")
            .header("x-multi", "b")
            .body(empty())
            .unwrap(),
        "/query" => http::Response::new(full(req.uri().query().unwrap_or_default().to_owned())),
        "/method" => http::Response::new(full(req.method().to_string())),
        "/host" => http::Response::new(full(header(&req, "host"))),
        "/teapot" => http::Response::builder()
            .status(StatusCode::IM_A_TEAPOT)
            .body(empty())
            .unwrap(),
        "/echo" => http::Response::new(req.into_body().boxed_unsync()),
        _ => http::Response::new(full(path)),
    };
    Ok(res)
}

async fn spawn_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(backend))
                    .await;
            });
        }
    });
    addr
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn gateway_for(addr: SocketAddr, base_path: &str) -> Gateway {
    let registry = Registry::new(vec![
        BackendDefinition::new("foo", "foo", format!("http://{addr}{base_path}"), "images/foo.png"),
    ])
    .unwrap();
    Gateway::new(Arc::new(registry))
}

fn request(method: http::Method, uri: &str) -> http::request::Builder {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "foo.bigtits.com")
}

async fn send(gateway: &Gateway, req: http::Request<Body>) -> (StatusCode, http::HeaderMap, Bytes) {
    let res = gateway.handle(Request::new(req)).await.into_inner();
    let (parts, body) = res.into_parts();
    (parts.status, parts.headers, body.collect().await.unwrap().to_bytes())
}

async fn get(gateway: &Gateway, uri: &str) -> (StatusCode, http::HeaderMap, Bytes) {
    let req = request(http::Method::GET, uri).body(empty()).unwrap();
    send(gateway, req).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_relays_body() {
    let gateway = gateway_for(spawn_backend().await, "");
    let (status, _, body) = get(&gateway, "/natasha").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hello world\n");
}

#[tokio::test]
async fn path_is_forwarded_under_base_path() {
    let gateway = gateway_for(spawn_backend().await, "");
    assert_eq!(&get(&gateway, "/some/where").await.2[..], b"/some/where");

    let gateway = gateway_for(spawn_backend().await, "/base");
    assert_eq!(&get(&gateway, "/some/where").await.2[..], b"/base/some/where");
}

#[tokio::test]
async fn query_is_preserved() {
    let gateway = gateway_for(spawn_backend().await, "");
    assert_eq!(&get(&gateway, "/query?search=bigtits&x=1").await.2[..], b"search=bigtits&x=1");
}

#[tokio::test]
async fn request_header_reaches_backend() {
    let gateway = gateway_for(spawn_backend().await, "");
    let req = request(http::Method::GET, "/bogus")
        .header("bogus", "something in the header!")
        .body(empty())
        .unwrap();
    assert_eq!(&send(&gateway, req).await.2[..], b"something in the header!");
}

#[tokio::test]
async fn repeated_request_header_is_folded() {
    let gateway = gateway_for(spawn_backend().await, "");
    let req = request(http::Method::GET, "/bogus")
        .header("bogus", "one")
        .header("bogus", "two")
        .body(empty())
        .unwrap();
    assert_eq!(&send(&gateway, req).await.2[..], b"one;two");
}

#[tokio::test]
async fn backend_sees_its_own_host() {
    let addr = spawn_backend().await;
    let gateway = gateway_for(addr, "");
    assert_eq!(&get(&gateway, "/host").await.2[..], addr.to_string().as_bytes());
}

#[tokio::test]
async fn response_headers_and_status_are_relayed() {
    let gateway = gateway_for(spawn_backend().await, "");

    let (_, headers, _) = get(&gateway, "/set-bogus").await;
    assert_eq!(headers["bogus"], "has been set on the server");

    let (_, headers, _) = get(&gateway, "/double").await;
    assert_eq!(headers.get_all("x-multi").iter().count(), 1);
    assert_eq!(headers["x-multi"], "a;b");

    let (status, _, _) = get(&gateway, "/teapot").await;
    assert_eq!(status, StatusCode::IM_A_TEAPOT);
}

#[tokio::test]
async fn post_and_put_bodies_round_trip() {
    let gateway = gateway_for(spawn_backend().await, "");
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();

    for method in [http::Method::POST, http::Method::PUT] {
        let req = request(method.clone(), "/echo")
            .body(full(payload.clone()))
            .unwrap();
        let (status, _, body) = send(&gateway, req).await;
        assert_eq!(status, StatusCode::OK, "{method}");
        assert_eq!(&body[..], &payload[..], "{method}");

        let req = request(method.clone(), "/method").body(empty()).unwrap();
        assert_eq!(&send(&gateway, req).await.2[..], method.as_str().as_bytes());
    }
}

#[tokio::test]
async fn delete_is_refused_without_contacting_backend() {
    let gateway = gateway_for(spawn_backend().await, "");
    let req = request(http::Method::DELETE, "/method").body(empty()).unwrap();
    let (status, _, body) = send(&gateway, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"method DELETE is not yet available");
}

#[tokio::test]
async fn unreachable_backend_is_500_and_service_continues() {
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let live = spawn_backend().await;

    let registry = Registry::new(vec![
        BackendDefinition::new("dead", "dead", format!("http://{dead}"), ""),
        BackendDefinition::new("foo", "foo", format!("http://{live}"), ""),
    ])
    .unwrap();
    let gateway = Gateway::new(Arc::new(registry));

    let req = http::Request::builder()
        .uri("/natasha")
        .header("host", "dead.bigtits.com")
        .body(empty())
        .unwrap();
    let (status, _, _) = send(&gateway, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _, body) = get(&gateway, "/natasha").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hello world\n");
}

#[tokio::test]
async fn unknown_subdomain_is_not_forwarded() {
    let gateway = gateway_for(spawn_backend().await, "");
    let req = http::Request::builder()
        .uri("/natasha")
        .header("host", "bar.bigtits.com")
        .body(empty())
        .unwrap();
    let (status, _, body) = send(&gateway, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(&body[..], b"could not find a web application for bar");
}

#[tokio::test]
async fn registry_route_reads_the_host() {
    let gateway = gateway_for(spawn_backend().await, "");
    let req = request(http::Method::GET, "/natasha").body(empty()).unwrap();
    let res = gateway.registry().route(Request::new(req)).await;
    let body = res.into_inner().into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello world\n");

    let req = http::Request::builder().uri("/natasha").body(empty()).unwrap();
    let res = gateway.registry().route(Request::new(req)).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn served_over_tcp() {
    let backend_addr = spawn_backend().await;
    let gateway = gateway_for(backend_addr, "");

    let server = Server::from_listener(TcpListener::bind("127.0.0.1:0").await.unwrap());
    let proxy_addr = server.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve_with_shutdown(gateway, async {
        let _ = stopped.await;
    }));

    let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();

    let req = hyper::Request::builder()
        .uri(format!("http://{proxy_addr}/natasha"))
        .header("host", "foo.localhost:8000")
        .body(Full::default())
        .unwrap();
    let res = client.request(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&res.into_body().collect().await.unwrap().to_bytes()[..], b"hello world\n");

    let req = hyper::Request::builder()
        .uri(format!("http://{proxy_addr}/webapps"))
        .header("host", "localhost:8000")
        .body(Full::default())
        .unwrap();
    let res = client.request(req).await.unwrap();
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(
        &res.into_body().collect().await.unwrap().to_bytes()[..],
        br#"[{"name":"foo","url":"http://foo.localhost:8000","image":"images/foo.png"}]"#
    );

    // The client still holds idle keep-alive connections to the proxy;
    // shutdown has to close them rather than wait on them.
    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("shutdown waited on idle connections")
        .unwrap()
        .unwrap();
    drop(client);
}

/// Sends `parked` when a request arrives, never answers, and sends `dropped`
/// once hyper drops the handler because the caller went away.
async fn spawn_parked_backend() -> (SocketAddr, mpsc::UnboundedReceiver<&'static str>) {
    struct Dropped(mpsc::UnboundedSender<&'static str>);

    impl Drop for Dropped {
        fn drop(&mut self) {
            let _ = self.0.send("dropped");
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let tx = tx.clone();
            let svc = service_fn(move |_req: hyper::Request<Incoming>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send("parked");
                    let _guard = Dropped(tx);
                    std::future::pending::<Result<http::Response<Body>, Infallible>>().await
                }
            });
            tokio::spawn(async move {
                let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), svc).await;
            });
        }
    });
    (addr, rx)
}

#[tokio::test]
async fn dropping_the_caller_cancels_the_backend_call() {
    let (addr, mut events) = spawn_parked_backend().await;
    let gateway = gateway_for(addr, "");

    let call = tokio::spawn(async move {
        let req = request(http::Method::GET, "/slow").body(empty()).unwrap();
        gateway.handle(Request::new(req)).await
    });

    let parked = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(parked, Some("parked"));

    // What hyper does to the service future when the inbound client hangs up.
    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());

    let dropped = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("backend call outlived its caller");
    assert_eq!(dropped, Some("dropped"));
}
