//! # rove
//!
//! A small HTTP toolkit for Rust services behind a reverse proxy: route
//! groups, before/after middleware, a per-request context, and handlers that
//! return plain values instead of hand-built responses.
//!
//! ## The contract
//!
//! nginx handles TLS, rate limiting, slow clients, and body-size limits.
//! rove does not — by design. The proxy does proxy things. The framework
//! does framework things. What's left for rove is the part that changes
//! between applications:
//!
//! - **Route groups** — nest groups under path prefixes; middleware attached
//!   to a group wraps every route in it, child middleware closest to the
//!   handler ([`RouteGroup`])
//! - **Value handlers** — return `Ok(())`, a string, bytes, or
//!   [`Json`]-wrapped data; rove picks the status, body, and content type
//! - **Trusted errors** — [`err(status, message)`](err) reaches the client
//!   as JSON; any other error is logged and becomes an opaque 500
//! - **Hot swap** — [`Router::swap`] replaces the whole route table
//!   atomically while serving
//! - **Websockets** — [`RouteGroup::websocket`] upgrades per RFC 6455 and
//!   hands the handler an owned message stream
//! - **Built-in middleware** — panic recovery, CORS, and content-type
//!   stamping in [`mid`]; route-local wrapping via [`wrap_before`] /
//!   [`wrap_after`]
//! - Radix-tree routing — O(path-length) lookup via [`matchit`]
//! - Graceful shutdown — SIGTERM / Ctrl-C, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rove::{err, Ctx, Error, Json, Request, RouteGroup, Router, Server};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: String,
//! }
//!
//! async fn get_user(_req: Request, ctx: Ctx) -> Result<Json<User>, Error> {
//!     let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!     Ok(Json(User { id }))
//! }
//!
//! async fn require_token(req: Request, _ctx: Ctx) -> Result<(), Error> {
//!     match req.header("authorization") {
//!         Some(_) => Ok(()),
//!         None => Err(err(401, "missing token")),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let v1 = RouteGroup::new("/v1").get("/users/{id}", get_user);
//!     let api = RouteGroup::new("/api").before(require_token).add_group(v1);
//!
//!     let app = Router::new().add_group(api);
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod context;
mod error;
mod group;
mod handler;
mod logger;
mod middleware;
mod options;
mod request;
mod response;
mod router;
mod server;
mod ws;

pub mod health;
pub mod mid;

pub use context::Ctx;
pub use error::{err, Error};
pub use group::RouteGroup;
pub use handler::Handler;
pub use logger::{Level, LogRef, Logger, NullLogger, TraceLogger};
pub use middleware::{wrap_after, wrap_before, After, Before};
pub use options::Options;
pub use request::Request;
pub use response::{IntoValue, Json, Reply, Value};
pub use router::Router;
pub use server::Server;
pub use ws::{WsHandler, WsStream};
