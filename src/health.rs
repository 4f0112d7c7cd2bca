//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. rove answers them.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your router, and mark them quiet so probe traffic does
//! not drown the request log:
//!
//! ```rust,no_run
//! use rove::{health, Options, Router};
//!
//! let opts = Options::new().quiet_route("/healthz").quiet_route("/readyz");
//! let app = Router::with_options(opts)
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Override `readiness` with a custom handler if you need to gate on
//! dependency availability (database connections, downstream services, etc.):
//!
//! ```rust,no_run
//! use rove::{err, Ctx, Error, Request};
//!
//! async fn readiness(_req: Request, _ctx: Ctx) -> Result<&'static str, Error> {
//!     if dependencies_are_healthy().await {
//!         Ok("ready")
//!     } else {
//!         Err(err(503, "warming up"))
//!     }
//! }
//!
//! async fn dependencies_are_healthy() -> bool { true }
//! ```

use crate::context::Ctx;
use crate::error::Error;
use crate::request::Request;

/// Kubernetes liveness probe handler.
///
/// Always returns `200 OK` with body `"ok"`. If the process can respond to
/// HTTP at all, it is alive — this handler intentionally has no dependencies.
pub async fn liveness(_req: Request, _ctx: Ctx) -> Result<&'static str, Error> {
    Ok("ok")
}

/// Kubernetes readiness probe handler (default implementation).
///
/// Returns `200 OK` with body `"ready"`. Replace this with your own handler
/// if your application needs a warm-up period or must verify dependency health
/// before accepting traffic.
pub async fn readiness(_req: Request, _ctx: Ctx) -> Result<&'static str, Error> {
    Ok("ready")
}
