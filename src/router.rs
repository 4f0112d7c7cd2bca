//! Route table, dispatch, and hot swapping.
//!
//! The [`Router`] lives in three phases:
//!
//! 1. **unmounted** — routes are registered on the root group;
//! 2. **mounted** — [`Router::finalize`] flattens the root group into one
//!    `matchit` tree per method, exactly once (second calls are no-ops);
//! 3. **serving** — [`Router::handle`] resolves each request against the
//!    active table.
//!
//! The active table sits behind an [`ArcSwap`]: lookups are lock-free loads,
//! and [`Router::swap`] replaces the whole table in a single store. A
//! request that already loaded the old table finishes against it; no reader
//! ever observes a half-built table.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http::uri::PathAndQuery;
use http::{HeaderValue, Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::Serialize;

use crate::context::Ctx;
use crate::group::{Route, RouteGroup};
use crate::handler::{BoxedHandler, Handler};
use crate::logger::{Level, LogRef, Logger};
use crate::middleware::{After, Before};
use crate::options::Options;
use crate::request::Request;
use crate::response::normalize;
use crate::ws::WsHandler;

/// The application router: a root [`RouteGroup`] plus the mounted,
/// hot-swappable dispatch table.
pub struct Router {
    root: RouteGroup,
    table: ArcSwap<RouteTable>,
    mounted: AtomicBool,
    quiet: HashSet<String>,
    log: LogRef,
    app_name: String,
    proxy: Option<FallbackProxy>,
}

/// Every request is logged under a scope carrying its ID.
#[derive(Serialize)]
struct RequestScope {
    request_id: String,
}

impl Router {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            root: RouteGroup::new(""),
            table: ArcSwap::from_pointee(RouteTable::default()),
            mounted: AtomicBool::new(false),
            quiet: options.quiet_routes.into_iter().collect(),
            log: options.logger,
            app_name: options.app_name,
            proxy: options.fallback.map(FallbackProxy::new),
        }
    }

    // ── Registration (delegates to the root group) ───────────────────────────

    fn map_root(mut self, f: impl FnOnce(RouteGroup) -> RouteGroup) -> Self {
        let root = std::mem::replace(&mut self.root, RouteGroup::new(""));
        self.root = f(root);
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.get(path, handler))
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.post(path, handler))
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.put(path, handler))
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.patch(path, handler))
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.delete(path, handler))
    }

    pub fn head(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.head(path, handler))
    }

    pub fn options(self, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.options(path, handler))
    }

    pub fn handle_route(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.map_root(|g| g.handle(method, path, handler))
    }

    pub fn websocket(self, path: &str, handler: impl WsHandler) -> Self {
        self.map_root(|g| g.websocket(path, handler))
    }

    /// Before-middleware on the root group — wraps every route.
    pub fn before(self, mw: impl Before) -> Self {
        self.map_root(|g| g.before(mw))
    }

    /// After-middleware on the root group.
    pub fn after(self, mw: impl After) -> Self {
        self.map_root(|g| g.after(mw))
    }

    pub fn add_group(self, group: RouteGroup) -> Self {
        self.map_root(|g| g.add_group(group))
    }

    // ── Mounting and swapping ────────────────────────────────────────────────

    /// Mounts the root group into the dispatch table. Runs exactly once; a
    /// second call is a no-op. [`Server::serve`](crate::Server::serve) calls
    /// this before accepting, so calling it yourself is only needed when
    /// embedding the router in another server.
    ///
    /// # Panics
    ///
    /// Panics if a registered path is rejected by the matcher (bad pattern
    /// or conflicting routes). Routes are declared at startup; a bad one is
    /// a programming error, not a runtime condition.
    pub fn finalize(&mut self) {
        if self.mounted.swap(true, Ordering::SeqCst) {
            return;
        }

        let root = std::mem::replace(&mut self.root, RouteGroup::new(""));
        self.table
            .store(Arc::new(RouteTable::build(root.flatten(), self.log.as_ref())));
    }

    /// Atomically replaces the active table with `group`, flattened. Requests
    /// already in flight complete against the table they resolved on.
    ///
    /// # Panics
    ///
    /// Like [`Router::finalize`], panics on paths the matcher rejects.
    pub fn swap(&self, group: RouteGroup) {
        self.table
            .store(Arc::new(RouteTable::build(group.flatten(), self.log.as_ref())));
    }

    pub(crate) fn app_name(&self) -> &str {
        &self.app_name
    }

    pub(crate) fn log(&self) -> LogRef {
        Arc::clone(&self.log)
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Resolves one request into one response. Public so the router can be
    /// embedded in transports other than [`Server`](crate::Server) (or
    /// driven directly in tests).
    pub async fn handle(
        &self,
        req: http::Request<Bytes>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Full<Bytes>> {
        let table = self.table.load();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let Some((handler, params)) = table.lookup(&method, &path) else {
            // the proxy owns every miss, wrong-method included; 404/405
            // fallthrough applies only when no upstream is configured
            if let Some(proxy) = &self.proxy {
                return proxy.forward(req, self.log.as_ref()).await;
            }
            if table.allows_other_method(&method, &path) {
                return plain_status(StatusCode::METHOD_NOT_ALLOWED);
            }

            self.log.debug(&format!("not handled: {method} {path}"));
            return plain_status(StatusCode::NOT_FOUND);
        };

        let ctx = Ctx::new(Arc::clone(&self.log), params);
        ctx.use_scope(RequestScope { request_id: ctx.request_id().to_owned() });

        // quiet routes are downgraded to debug, never fully suppressed
        let level = if self.quiet.contains(&path) { Level::Debug } else { Level::Info };
        let log = ctx.log();

        match remote_addr {
            Some(remote) => log.log(level, &format!("{method} {path} from {remote}")),
            None => log.log(level, &format!("{method} {path}")),
        }
        let started = Instant::now();

        let request = Request::from_http(req, remote_addr);
        let result = handler.call(request, ctx.clone()).await;

        // the chain may have re-scoped the logger; pick up the latest
        let rendered = normalize(result, ctx.log().as_ref());
        let status = rendered.status;

        let explicit_content_type = ctx.content_type_set();
        let mut headers = ctx.take_headers();
        if !explicit_content_type {
            if let Some(content_type) = rendered.content_type {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }

        // re-read the logger for the completion line as well, so scopes
        // installed mid-chain show up on it
        ctx.log().log(
            level,
            &format!(
                "{method} {path} completed ({status}) in {}ms",
                started.elapsed().as_millis()
            ),
        );

        let mut resp = http::Response::new(Full::new(rendered.body));
        *resp.status_mut() = status;
        *resp.headers_mut() = headers;
        resp
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ── RouteTable ────────────────────────────────────────────────────────────────

/// The immutable dispatch table: one radix tree per HTTP method,
/// O(path-length) lookup.
#[derive(Default)]
struct RouteTable {
    trees: HashMap<Method, matchit::Router<BoxedHandler>>,
}

impl RouteTable {
    fn build(routes: Vec<Route>, log: &dyn Logger) -> Self {
        let mut trees: HashMap<Method, matchit::Router<BoxedHandler>> = HashMap::new();

        for route in routes {
            log.debug(&format!("mounting route {} {}", route.method, route.path));
            trees
                .entry(route.method.clone())
                .or_default()
                .insert(&route.path, route.handler)
                .unwrap_or_else(|e| panic!("invalid route `{}`: {e}", route.path));
        }

        Self { trees }
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;

        let handler = Arc::clone(matched.value);
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();

        Some((handler, params))
    }

    fn allows_other_method(&self, method: &Method, path: &str) -> bool {
        self.trees
            .iter()
            .any(|(m, tree)| m != method && tree.at(path).is_ok())
    }
}

// ── Fallback proxy ────────────────────────────────────────────────────────────

/// Forwards unmatched requests to a configured upstream, unmodified except
/// for the authority.
struct FallbackProxy {
    target: Uri,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl FallbackProxy {
    fn new(target: Uri) -> Self {
        Self {
            target,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    async fn forward(
        &self,
        req: http::Request<Bytes>,
        log: &dyn Logger,
    ) -> http::Response<Full<Bytes>> {
        let (mut parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let mut target = Uri::builder();
        if let Some(scheme) = self.target.scheme() {
            target = target.scheme(scheme.clone());
        }
        if let Some(authority) = self.target.authority() {
            target = target.authority(authority.clone());
        }

        parts.uri = match target.path_and_query(path_and_query).build() {
            Ok(uri) => uri,
            Err(e) => {
                log.error(&format!("fallback target produced an invalid uri: {e}"));
                return plain_status(StatusCode::BAD_GATEWAY);
            }
        };

        let outbound = http::Request::from_parts(parts, Full::new(body));
        let resp = match self.client.request(outbound).await {
            Ok(resp) => resp,
            Err(e) => {
                log.error(&format!("fallback proxy request failed: {e}"));
                return plain_status(StatusCode::BAD_GATEWAY);
            }
        };

        let (parts, body) = resp.into_parts();
        match body.collect().await {
            Ok(collected) => {
                let mut resp = http::Response::new(Full::new(collected.to_bytes()));
                *resp.status_mut() = parts.status;
                *resp.headers_mut() = parts.headers;
                // the body is re-framed with a content-length
                resp.headers_mut().remove(TRANSFER_ENCODING);
                resp
            }
            Err(e) => {
                log.error(&format!("fallback proxy body read failed: {e}"));
                plain_status(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

fn plain_status(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut resp = http::Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{err, Error};
    use crate::logger::NullLogger;
    use crate::response::Json;

    /// One captured log line.
    #[derive(Clone)]
    struct Record {
        level: Level,
        msg: String,
        scope: Option<String>,
    }

    /// Captures every line so tests can assert on levels, content, and the
    /// scope each line was emitted under.
    #[derive(Clone, Default)]
    struct RecordingLogger {
        records: Arc<Mutex<Vec<Record>>>,
        scope: Option<String>,
    }

    impl RecordingLogger {
        fn lines(&self) -> Vec<Record> {
            self.records.lock().expect("records lock").clone()
        }
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: Level, msg: &str) {
            self.records.lock().expect("records lock").push(Record {
                level,
                msg: msg.to_owned(),
                scope: self.scope.clone(),
            });
        }

        fn scoped(&self, scope: serde_json::Value) -> LogRef {
            Arc::new(Self {
                records: Arc::clone(&self.records),
                scope: Some(scope.to_string()),
            })
        }
    }

    fn get(path: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Bytes::new())
            .expect("request")
    }

    async fn body_of(resp: http::Response<Full<Bytes>>) -> Bytes {
        resp.into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
    }

    fn quiet_options() -> Options {
        Options::new().logger(NullLogger::new())
    }

    #[tokio::test]
    async fn lookup_miss_is_a_404() {
        let mut router = Router::with_options(quiet_options());
        router.finalize();

        let resp = router.handle(get("/nowhere"), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_a_405() {
        let mut router = Router::with_options(quiet_options())
            .get("/thing", |_req: Request, _ctx: Ctx| async { Ok("here") });
        router.finalize();

        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/thing")
            .body(Bytes::new())
            .expect("request");

        let resp = router.handle(req, None).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn path_params_reach_the_context() {
        let mut router = Router::with_options(quiet_options()).get(
            "/users/{id}",
            |_req: Request, ctx: Ctx| async move {
                let id = ctx.param("id").unwrap_or("unknown").to_owned();
                Ok(id)
            },
        );
        router.finalize();

        let resp = router.handle(get("/users/42"), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&body_of(resp).await[..], b"42");
    }

    #[tokio::test]
    async fn deny_middleware_rejects_with_trusted_json() {
        async fn deny_hackers(req: Request, ctx: Ctx) -> Result<(), Error> {
            if req.path().contains("hack") {
                ctx.log().error("HACKER!!");
                return Err(err(403, "begone, hacker"));
            }
            Ok(())
        }

        #[derive(serde::Serialize)]
        struct Me {
            me: &'static str,
        }

        async fn me(_req: Request, _ctx: Ctx) -> Result<Json<Me>, Error> {
            Ok(Json(Me { me: "mario" }))
        }

        let v1 = RouteGroup::new("/v1").get("/me", me).get("/me/hack", me);
        let api = RouteGroup::new("/api").before(deny_hackers).add_group(v1);

        let mut router = Router::with_options(quiet_options()).add_group(api);
        router.finalize();

        let ok = router.handle(get("/api/v1/me"), None).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(
            ok.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json"),
        );
        assert_eq!(&body_of(ok).await[..], br#"{"me":"mario"}"#);

        let denied = router.handle(get("/api/v1/me/hack"), None).await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            &body_of(denied).await[..],
            br#"{"status":403,"message":"begone, hacker"}"#,
        );
    }

    #[tokio::test]
    async fn untyped_errors_never_leak_their_text() {
        let mut router = Router::with_options(quiet_options()).get(
            "/boom",
            |_req: Request, _ctx: Ctx| async {
                Err::<(), Error>(Error::internal("this is a bad idea"))
            },
        );
        router.finalize();

        let resp = router.handle(get("/boom"), None).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body_of(resp).await[..], b"Internal Server Error");
    }

    #[tokio::test]
    async fn swapping_the_table_changes_the_served_handler() {
        let mut router = Router::with_options(quiet_options())
            .get("/somepath", |_req: Request, _ctx: Ctx| async { Ok("before") });
        router.finalize();

        let resp = router.handle(get("/somepath"), None).await;
        assert_eq!(&body_of(resp).await[..], b"before");

        let replacement = RouteGroup::new("")
            .get("/somepath", |_req: Request, _ctx: Ctx| async { Ok("after") });
        router.swap(replacement);

        let resp = router.handle(get("/somepath"), None).await;
        assert_eq!(&body_of(resp).await[..], b"after");
    }

    #[tokio::test]
    async fn finalize_twice_is_a_no_op() {
        let mut router = Router::with_options(quiet_options())
            .get("/somepath", |_req: Request, _ctx: Ctx| async { Ok("once") });
        router.finalize();
        router.finalize();

        let resp = router.handle(get("/somepath"), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&body_of(resp).await[..], b"once");
    }

    #[tokio::test]
    async fn middleware_headers_reach_the_response() {
        async fn stamp(_req: Request, ctx: Ctx) -> Result<(), Error> {
            ctx.insert_header("x-rove-test", "foobar");
            Ok(())
        }

        let mut router = Router::with_options(quiet_options())
            .before(stamp)
            .get("/stamped", |_req: Request, _ctx: Ctx| async { Ok("ok") });
        router.finalize();

        let resp = router.handle(get("/stamped"), None).await;
        assert_eq!(
            resp.headers().get("x-rove-test").and_then(|v| v.to_str().ok()),
            Some("foobar"),
        );
    }

    #[tokio::test]
    async fn explicit_content_type_wins_over_detection() {
        let mut router = Router::with_options(quiet_options()).get(
            "/xml",
            |_req: Request, ctx: Ctx| async move {
                ctx.insert_header("content-type", "application/xml");
                Ok("<ok/>")
            },
        );
        router.finalize();

        let resp = router.handle(get("/xml"), None).await;
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/xml"),
        );
    }

    #[tokio::test]
    async fn empty_result_is_a_204_without_content_type() {
        let mut router = Router::with_options(quiet_options())
            .get("/nothing", |_req: Request, _ctx: Ctx| async { Ok(()) });
        router.finalize();

        let resp = router.handle(get("/nothing"), None).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().get(CONTENT_TYPE).is_none());
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn quiet_routes_log_at_debug_others_at_info() {
        let recorder = RecordingLogger::default();
        let options = Options::new()
            .logger(Arc::new(recorder.clone()))
            .quiet_route("/healthz");

        let mut router = Router::with_options(options)
            .get("/healthz", |_req: Request, _ctx: Ctx| async { Ok("ok") })
            .get("/loud", |_req: Request, _ctx: Ctx| async { Ok("ok") });
        router.finalize();

        router.handle(get("/healthz"), None).await;
        router.handle(get("/loud"), None).await;

        let lines = recorder.lines();
        let quiet_start = lines
            .iter()
            .find(|r| r.msg.starts_with("GET /healthz"))
            .expect("quiet start line");
        assert_eq!(quiet_start.level, Level::Debug);

        let loud_start = lines
            .iter()
            .find(|r| r.msg.starts_with("GET /loud"))
            .expect("loud start line");
        assert_eq!(loud_start.level, Level::Info);
    }

    #[tokio::test]
    async fn wrong_method_goes_to_the_fallback_when_one_is_configured() {
        // upstream deliberately unreachable: any proxied miss surfaces as 502
        let options = Options::new()
            .logger(NullLogger::new())
            .fallback("http://127.0.0.1:59999".parse().expect("uri"));

        let mut router = Router::with_options(options)
            .get("/thing", |_req: Request, _ctx: Ctx| async { Ok("here") });
        router.finalize();

        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/thing")
            .body(Bytes::new())
            .expect("request");

        // the proxy is consulted before any 405 fallthrough
        let resp = router.handle(req, None).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        // registered routes still dispatch locally
        let resp = router.handle(get("/thing"), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn completion_log_carries_scopes_installed_mid_chain() {
        #[derive(serde::Serialize)]
        struct Tenant {
            tenant: &'static str,
        }

        async fn tag_tenant(_req: Request, ctx: Ctx) -> Result<(), Error> {
            ctx.use_scope(Tenant { tenant: "acme" });
            Ok(())
        }

        let recorder = RecordingLogger::default();
        let options = Options::new().logger(Arc::new(recorder.clone()));

        let mut router = Router::with_options(options)
            .before(tag_tenant)
            .get("/t", |_req: Request, _ctx: Ctx| async { Ok("ok") });
        router.finalize();

        router.handle(get("/t"), None).await;

        let lines = recorder.lines();

        // the start line runs before the middleware: request-id scope only
        let start = lines.iter().find(|r| r.msg == "GET /t").expect("start line");
        assert!(start.scope.as_deref().is_some_and(|s| s.contains("request_id")));

        // the completion line picks up the scope the middleware installed
        let completion = lines
            .iter()
            .find(|r| r.msg.contains("completed"))
            .expect("completion line");
        assert!(completion.scope.as_deref().is_some_and(|s| s.contains("acme")));
    }

    #[tokio::test]
    async fn after_middleware_transforms_the_body() {
        use crate::response::Value;

        async fn exclaim(_req: Request, _ctx: Ctx, value: Value) -> Result<Value, Error> {
            match value {
                Value::Text(s) => Ok(Value::Text(format!("{s}!"))),
                other => Ok(other),
            }
        }

        let mut router = Router::with_options(quiet_options())
            .after(exclaim)
            .get("/shout", |_req: Request, _ctx: Ctx| async { Ok("hello") });
        router.finalize();

        let resp = router.handle(get("/shout"), None).await;
        assert_eq!(&body_of(resp).await[..], b"hello!");
    }
}
