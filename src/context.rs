//! Per-request context.
//!
//! One [`Ctx`] is created for each incoming request and dropped when the
//! request completes. It is the only mutable state a request carries:
//! outbound headers, a typed key/value store for middleware-to-handler
//! communication, the (lazily generated) request ID, and the request-scoped
//! logger. Handles are cheap clones of one shared core; the core is owned by
//! exactly one request and never crosses to another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use uuid::Uuid;

use crate::logger::{LogRef, Logger};

/// Per-request carrier handed to every middleware and handler.
#[derive(Clone)]
pub struct Ctx {
    inner: Arc<Inner>,
}

struct Inner {
    log: RwLock<LogRef>,
    params: HashMap<String, String>,
    request_id: OnceLock<String>,
    headers: Mutex<HeaderMap>,
    store: Mutex<Extensions>,
    scope: Mutex<Option<serde_json::Value>>,
}

impl Ctx {
    pub(crate) fn new(log: LogRef, params: HashMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                log: RwLock::new(log),
                params,
                request_id: OnceLock::new(),
                headers: Mutex::new(HeaderMap::new()),
                store: Mutex::new(Extensions::new()),
                scope: Mutex::new(None),
            }),
        }
    }

    /// The request's unique ID. Generated on first call, cached for the
    /// lifetime of this context; never reused across requests.
    pub fn request_id(&self) -> &str {
        self.inner
            .request_id
            .get_or_init(|| Uuid::new_v4().to_string())
    }

    /// A named path parameter from the matched route.
    ///
    /// For a route `/users/{id}`, `ctx.param("id")` on `/users/42` returns
    /// `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.inner.params.get(key).map(String::as_str)
    }

    /// The current request-scoped logger.
    pub fn log(&self) -> LogRef {
        match self.inner.log.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Installs `scope` on this context: every subsequent line logged
    /// through [`Ctx::log`] carries it as structured metadata. The logger
    /// the context was created with is not mutated; a derived instance
    /// replaces it on this context only.
    pub fn use_scope(&self, scope: impl Serialize) {
        let value = serde_json::to_value(scope).unwrap_or(serde_json::Value::Null);

        let scoped = self.log().scoped(value.clone());
        if let Ok(mut log) = self.inner.log.write() {
            *log = scoped;
        }
        if let Ok(mut slot) = self.inner.scope.lock() {
            *slot = Some(value);
        }
    }

    /// The scope installed by [`Ctx::use_scope`], if any.
    pub fn scope(&self) -> Option<serde_json::Value> {
        self.inner.scope.lock().ok().and_then(|s| s.clone())
    }

    /// Stores a typed value for downstream middleware and the handler.
    /// One value per type; a second `set::<T>` replaces the first.
    pub fn set<T: Clone + Send + Sync + 'static>(&self, value: T) {
        if let Ok(mut store) = self.inner.store.lock() {
            store.insert(value);
        }
    }

    /// Retrieves a value stored with [`Ctx::set`].
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.inner
            .store
            .lock()
            .ok()
            .and_then(|store| store.get::<T>().cloned())
    }

    /// Sets an outbound response header. Invalid names or values are
    /// dropped (and logged at debug).
    pub fn insert_header(&self, name: &str, value: &str) {
        let parsed = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        );

        match parsed {
            (Ok(name), Ok(value)) => {
                if let Ok(mut headers) = self.inner.headers.lock() {
                    headers.insert(name, value);
                }
            }
            _ => self.log().debug(&format!("dropping invalid header {name}: {value}")),
        }
    }

    /// Reads back an outbound header previously set on this context.
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.headers.lock().ok().and_then(|headers| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        })
    }

    /// Snapshot of the outbound headers, merged into the response at flush.
    pub(crate) fn take_headers(&self) -> HeaderMap {
        self.inner
            .headers
            .lock()
            .map(|mut h| std::mem::take(&mut *h))
            .unwrap_or_default()
    }

    pub(crate) fn content_type_set(&self) -> bool {
        self.inner
            .headers
            .lock()
            .map(|h| h.contains_key(CONTENT_TYPE))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NullLogger;

    fn ctx() -> Ctx {
        Ctx::new(NullLogger::new(), HashMap::new())
    }

    #[test]
    fn request_id_is_generated_once_and_cached() {
        let one = ctx();
        let first = one.request_id().to_owned();
        assert_eq!(first, one.request_id());

        let other = ctx();
        assert_ne!(first, other.request_id());
    }

    #[test]
    fn typed_store_round_trips() {
        #[derive(Clone, Debug, PartialEq)]
        struct Who(String);

        let ctx = ctx();
        assert_eq!(ctx.get::<Who>(), None);

        ctx.set(Who("mario".into()));
        assert_eq!(ctx.get::<Who>(), Some(Who("mario".into())));

        ctx.set(Who("luigi".into()));
        assert_eq!(ctx.get::<Who>(), Some(Who("luigi".into())));
    }

    #[test]
    fn scope_is_stored_and_retrievable() {
        #[derive(serde::Serialize)]
        struct Scope {
            request_id: &'static str,
        }

        let ctx = ctx();
        assert!(ctx.scope().is_none());

        ctx.use_scope(Scope { request_id: "abc" });
        assert_eq!(
            ctx.scope(),
            Some(serde_json::json!({ "request_id": "abc" }))
        );
    }

    #[test]
    fn headers_fill_and_drain() {
        let ctx = ctx();
        ctx.insert_header("x-test", "foobar");
        ctx.insert_header("content-type", "application/xml");

        assert_eq!(ctx.header("x-test").as_deref(), Some("foobar"));
        assert!(ctx.content_type_set());

        let headers = ctx.take_headers();
        assert_eq!(headers.len(), 2);
        assert!(!ctx.content_type_set());
    }

    #[test]
    fn invalid_headers_are_dropped() {
        let ctx = ctx();
        ctx.insert_header("bad header name", "value");
        assert!(ctx.take_headers().is_empty());
    }
}
