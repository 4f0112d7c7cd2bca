//! Built-in middleware: panic recovery, CORS, and content-type stamping.
//!
//! [`cors`] and [`content_type`] are ordinary [`Before`] middleware —
//! register them on a group or router like any other. [`recover`] is a
//! handler *wrapper*: it has to own the handler's execution to catch its
//! panic, so it wraps one route at registration time instead:
//!
//! ```rust,no_run
//! use rove::{mid, Ctx, Error, Request, RouteGroup};
//!
//! async fn flaky(_req: Request, _ctx: Ctx) -> Result<&'static str, Error> {
//!     Ok("fine today")
//! }
//!
//! let api = RouteGroup::new("/api")
//!     .before(mid::cors("https://example.com"))
//!     .get("/flaky", mid::recover(flaky));
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::context::Ctx;
use crate::error::Error;
use crate::handler::Handler;
use crate::middleware::Before;
use crate::request::Request;

/// Wraps `handler` so a panic inside it becomes an internal error instead of
/// unwinding through the connection task. The client sees the usual opaque
/// `500 Internal Server Error`; the panic payload is logged like any other
/// internal failure.
pub fn recover(handler: impl Handler) -> impl Handler {
    let inner = handler.into_boxed_handler();

    move |req: Request, ctx: Ctx| {
        let inner = Arc::clone(&inner);

        AssertUnwindSafe(async move { inner.call(req, ctx).await })
            .catch_unwind()
            .map(|outcome| match outcome {
                Ok(result) => result,
                Err(panic) => Err(Error::internal(format!(
                    "handler panicked: {}",
                    panic_text(panic.as_ref()),
                ))),
            })
    }
}

fn panic_text(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Before-middleware allowing cross-origin requests from `domain`. An empty
/// domain disables it.
///
/// Browsers preflight with OPTIONS, so register an OPTIONS handler for the
/// same route carrying this middleware as well.
pub fn cors(domain: impl Into<String>) -> impl Before {
    let domain: Arc<str> = domain.into().into();

    move |_req: Request, ctx: Ctx| {
        let domain = Arc::clone(&domain);

        async move {
            if !domain.is_empty() {
                ctx.insert_header("access-control-allow-origin", &domain);
                ctx.insert_header("x-requested-with", "XMLHttpRequest");
                ctx.insert_header(
                    "access-control-allow-headers",
                    "Accept, Content-Type, Content-Length, Accept-Encoding, Authorization, \
                     cache-control",
                );
            }

            Ok::<(), Error>(())
        }
    }
}

/// Before-middleware forcing the response content type. An explicit header
/// on the [`Ctx`] wins over body-type detection, so this overrides whatever
/// the handler's value would have produced.
pub fn content_type(value: impl Into<String>) -> impl Before {
    let value: Arc<str> = value.into().into();

    move |_req: Request, ctx: Ctx| {
        let value = Arc::clone(&value);

        async move {
            ctx.insert_header("content-type", &value);
            Ok::<(), Error>(())
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;
    use crate::logger::NullLogger;
    use crate::options::Options;
    use crate::router::Router;

    fn get(path: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method(http::Method::GET)
            .uri(path)
            .body(Bytes::new())
            .expect("request")
    }

    fn quiet_router() -> Router {
        Router::with_options(Options::new().logger(NullLogger::new()))
    }

    async fn panicky(_req: Request, _ctx: Ctx) -> Result<(), Error> {
        panic!("boom at request time");
    }

    #[tokio::test]
    async fn a_recovered_panic_is_an_opaque_500() {
        let mut router = quiet_router().get("/flaky", recover(panicky));
        router.finalize();

        let resp = router.handle(get("/flaky"), None).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = resp.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[tokio::test]
    async fn the_panic_payload_lands_in_the_error() {
        let handler = recover(panicky).into_boxed_handler();
        let ctx = Ctx::new(NullLogger::new(), Default::default());
        let req = crate::request::Request::from_http(get("/flaky"), None);

        match handler.call(req, ctx).await {
            Err(Error::Internal(e)) => {
                assert!(e.to_string().contains("boom at request time"));
            }
            other => panic!("expected an internal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cors_headers_reach_the_response() {
        let mut router = quiet_router()
            .before(cors("https://example.com"))
            .get("/open", |_req: Request, _ctx: Ctx| async { Ok("hi") });
        router.finalize();

        let resp = router.handle(get("/open"), None).await;
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://example.com"),
        );
        assert!(resp.headers().contains_key("access-control-allow-headers"));
    }

    #[tokio::test]
    async fn an_empty_cors_domain_sets_nothing() {
        let mut router = quiet_router()
            .before(cors(""))
            .get("/closed", |_req: Request, _ctx: Ctx| async { Ok("hi") });
        router.finalize();

        let resp = router.handle(get("/closed"), None).await;
        assert!(!resp.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn forced_content_type_overrides_detection() {
        let mut router = quiet_router()
            .before(content_type("application/xml"))
            .get("/xml", |_req: Request, _ctx: Ctx| async { Ok("<ok/>") });
        router.finalize();

        let resp = router.handle(get("/xml"), None).await;
        assert_eq!(
            resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/xml"),
        );
    }
}
