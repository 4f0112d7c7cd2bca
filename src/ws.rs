//! WebSocket upgrade adapter.
//!
//! A websocket route is an ordinary GET route whose terminal handler
//! performs the RFC 6455 handshake. Handshake failures are trusted errors
//! and take the normal error-normalization path — the connection is never
//! considered open. On success the route responds `101 Switching Protocols`
//! and hands the upgraded connection to the streaming handler on its own
//! task; the handler owns the stream until it returns, and the stream is
//! dropped (closing the connection) on every exit path, including panics.
//! Because the 101 has already been written, the handler's result can only
//! be logged — it cannot change the HTTP status.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

use crate::context::Ctx;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::logger::Logger;
use crate::request::Request;
use crate::response::Value;

/// The bidirectional message stream a websocket handler owns.
pub type WsStream = WebSocketStream<TokioIo<Upgraded>>;

// ── WsHandler trait ───────────────────────────────────────────────────────────

/// Implemented for every valid websocket handler:
///
/// ```text
/// async fn name(req: Request, ctx: Ctx, stream: WsStream) -> Result<(), Error>
/// ```
///
/// Sealed, like [`Handler`](crate::Handler), via the blanket impl below.
pub trait WsHandler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_ws_handler(self) -> BoxedWsHandler;
}

mod private {
    pub trait Sealed {}
}

#[doc(hidden)]
pub trait ErasedWsHandler: Send + Sync {
    fn call(
        &self,
        req: Request,
        ctx: Ctx,
        stream: WsStream,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>>;
}

#[doc(hidden)]
pub type BoxedWsHandler = Arc<dyn ErasedWsHandler + 'static>;

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request, Ctx, WsStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
}

impl<F, Fut> WsHandler for F
where
    F: Fn(Request, Ctx, WsStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn into_boxed_ws_handler(self) -> BoxedWsHandler {
        Arc::new(WsFnHandler(self))
    }
}

struct WsFnHandler<F>(F);

impl<F, Fut> ErasedWsHandler for WsFnHandler<F>
where
    F: Fn(Request, Ctx, WsStream) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn call(
        &self,
        req: Request,
        ctx: Ctx,
        stream: WsStream,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>> {
        Box::pin((self.0)(req, ctx, stream))
    }
}

// ── Upgrade adapter ───────────────────────────────────────────────────────────

/// The terminal handler stored in the route table for a websocket route.
pub(crate) struct WsRoute {
    handler: BoxedWsHandler,
}

impl WsRoute {
    pub(crate) fn into_handler(handler: impl WsHandler) -> BoxedHandler {
        Arc::new(WsRoute { handler: handler.into_boxed_ws_handler() })
    }
}

impl ErasedHandler for WsRoute {
    fn call(&self, req: Request, ctx: Ctx) -> BoxFuture<Result<Value, Error>> {
        let handler = Arc::clone(&self.handler);

        Box::pin(async move {
            let key = validate_upgrade(&req)?;
            let on_upgrade = req
                .take_upgrade()
                .ok_or_else(|| Error::status(400, "connection does not support upgrades"))?;

            ctx.insert_header("upgrade", "websocket");
            ctx.insert_header("connection", "Upgrade");
            ctx.insert_header("sec-websocket-accept", &derive_accept_key(key.as_bytes()));

            let log = ctx.log();
            tokio::spawn(async move {
                let upgraded = match on_upgrade.await {
                    Ok(upgraded) => upgraded,
                    Err(e) => {
                        log.error(&format!("websocket upgrade failed: {e}"));
                        return;
                    }
                };

                let stream =
                    WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None)
                        .await;

                // the handler owns the stream; returning drops it, which
                // tears down the connection on every exit path
                match handler.call(req, ctx, stream).await {
                    Ok(()) => log.debug("websocket handler finished"),
                    Err(e) => log.error(&format!("websocket handler failed: {e}")),
                }
            });

            // headers are already on the Ctx; the dispatcher writes the 101
            Ok(Value::Reply { status: 101, body: Box::new(Value::Empty) })
        })
    }
}

/// Checks the client's side of the RFC 6455 handshake and returns the
/// `Sec-WebSocket-Key` to answer with.
fn validate_upgrade(req: &Request) -> Result<String, Error> {
    if req.method() != Method::GET {
        return Err(Error::status(405, "websocket upgrade requires GET"));
    }

    let upgrade_ok = req
        .header("upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !upgrade_ok {
        return Err(Error::status(400, "missing or invalid upgrade header"));
    }

    let version_ok = req
        .header("sec-websocket-version")
        .is_some_and(|v| v == "13");
    if !version_ok {
        return Err(Error::status(400, "unsupported websocket version"));
    }

    req.header("sec-websocket-key")
        .map(str::to_owned)
        .ok_or_else(|| Error::status(400, "missing sec-websocket-key header"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upgrade_request(headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().method(Method::GET).uri("/live");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        Request::from_http(builder.body(bytes::Bytes::new()).expect("request"), None)
    }

    #[test]
    fn valid_handshake_yields_the_key() {
        let req = upgrade_request(&[
            ("upgrade", "websocket"),
            ("sec-websocket-version", "13"),
            ("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="),
        ]);

        let key = validate_upgrade(&req).expect("handshake");
        assert_eq!(key, "dGhlIHNhbXBsZSBub25jZQ==");
        // RFC 6455 §1.3 sample key/accept pair
        assert_eq!(derive_accept_key(key.as_bytes()), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn missing_upgrade_header_is_a_trusted_400() {
        let req = upgrade_request(&[
            ("sec-websocket-version", "13"),
            ("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="),
        ]);

        match validate_upgrade(&req) {
            Err(Error::Status { status, .. }) => assert_eq!(status, 400),
            other => panic!("expected a trusted 400, got {other:?}"),
        }
    }

    #[test]
    fn wrong_version_is_rejected() {
        let req = upgrade_request(&[
            ("upgrade", "websocket"),
            ("sec-websocket-version", "8"),
            ("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="),
        ]);

        assert!(validate_upgrade(&req).is_err());
    }
}
