//! Health-check handlers, mounted on the apex host.
//!
//! | Check | Path |
//! |---|---|
//! | Liveness | `/healthz` |
//! | Readiness | `/readyz` |

use crate::{Request, Response};

/// Always `200 OK` with body `"ok"`.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"`.
///
/// The registry is loaded before the listener binds, so a process that
/// answers is ready. Backend reachability is not checked.
pub async fn readiness(_req: Request) -> Response {
    Response::text("ready")
}
