//! Handler trait and type erasure for apex routes.
//!
//! Apex handlers are async functions or closures taking a [`Request`]. The
//! router stores them side by side, so each is boxed behind one
//! `Arc<dyn ErasedHandler>` and its future behind a [`BoxFuture`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every `Fn(Request) -> impl Future<Output = impl IntoResponse>`.
///
/// Closures may capture shared state, which is how the discovery route reaches
/// the registry:
///
/// ```rust,ignore
/// let registry = Arc::clone(&registry);
/// router.on(Method::Get, "/webapps", move |req: Request| {
///     let registry = Arc::clone(&registry);
///     async move { registry.discovery(req.host().unwrap_or_default()) }
/// });
/// ```
pub trait Handler: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
