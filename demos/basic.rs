//! Minimal rove example — grouped JSON endpoints, middleware, health checks,
//! and a websocket echo.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/v1/users/42 -H 'authorization: anything'
//!   curl http://localhost:3000/api/v1/users/42          # → 401
//!   curl http://localhost:3000/api/v1/users/hack -H 'authorization: anything'  # → 403
//!   curl http://localhost:3000/healthz
//!   websocat ws://localhost:3000/echo

use futures_util::{SinkExt, StreamExt};
use rove::{
    err, health, mid, Ctx, Error, Json, Options, Reply, Request, RouteGroup, Router, Server,
    WsStream,
};
use serde::Serialize;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // /api/v1/users/{id}, with auth on the whole /api group and a hacker
    // filter closest to the handlers
    let v1 = RouteGroup::new("/v1")
        .before(deny_hackers)
        .get("/users/{id}", get_user)
        .post("/users", mid::recover(create_user))
        .delete("/users/{id}", delete_user);

    let api = RouteGroup::new("/api")
        .before(require_token)
        .before(mid::cors("https://example.com"))
        .add_group(v1);

    let opts = Options::new()
        .app_name("rove-basic")
        .quiet_route("/healthz")
        .quiet_route("/readyz");

    let app = Router::with_options(opts)
        .add_group(api)
        .websocket("/echo", echo)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// ── Middleware ────────────────────────────────────────────────────────────────

async fn require_token(req: Request, ctx: Ctx) -> Result<(), Error> {
    match req.header("authorization") {
        Some(_) => Ok(()),
        None => {
            ctx.log().debug("rejecting request without a token");
            Err(err(401, "missing token"))
        }
    }
}

async fn deny_hackers(req: Request, ctx: Ctx) -> Result<(), Error> {
    if req.path().contains("hack") {
        ctx.log().error("HACKER!!");
        return Err(err(403, "begone, hacker"));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct User {
    id: String,
    name: &'static str,
}

// GET /api/v1/users/{id} — Json picks the content type and serialization
async fn get_user(_req: Request, ctx: Ctx) -> Result<Json<User>, Error> {
    let id = ctx.param("id").unwrap_or("unknown").to_owned();
    Ok(Json(User { id, name: "alice" }))
}

// POST /api/v1/users → 201 with a location header
async fn create_user(req: Request, ctx: Ctx) -> Result<Reply<Json<User>>, Error> {
    if req.body().is_empty() {
        return Err(err(400, "empty body"));
    }

    // Real app: let input: CreateUser = serde_json::from_slice(req.body())?;
    ctx.insert_header("location", "/api/v1/users/99");
    Ok(Reply(201, Json(User { id: "99".to_owned(), name: "new_user" })))
}

// DELETE /api/v1/users/{id} → 204 No Content
async fn delete_user(_req: Request, _ctx: Ctx) -> Result<(), Error> {
    Ok(())
}

// GET /echo — upgraded to a websocket; echoes every message back
async fn echo(_req: Request, ctx: Ctx, mut stream: WsStream) -> Result<(), Error> {
    while let Some(msg) = stream.next().await {
        let msg = msg.map_err(Error::internal)?;

        if msg.is_text() || msg.is_binary() {
            ctx.log().debug("echoing one message");
            stream.send(msg).await.map_err(Error::internal)?;
        } else if msg.is_close() {
            break;
        }
    }

    Ok(())
}
