//! Incoming HTTP request metadata.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use hyper::upgrade::OnUpgrade;

/// An incoming request, with the body already collected.
///
/// Cheap to clone: every middleware and the handler see the same shared,
/// immutable request. Per-request mutable state lives on [`Ctx`](crate::Ctx),
/// not here.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    // present only when the transport offered a protocol upgrade;
    // taken exactly once by the websocket adapter
    upgrade: Mutex<Option<OnUpgrade>>,
}

impl Request {
    pub(crate) fn from_http(req: http::Request<Bytes>, remote_addr: Option<SocketAddr>) -> Self {
        let (mut parts, body) = req.into_parts();
        let upgrade = parts.extensions.remove::<OnUpgrade>();

        Self {
            inner: Arc::new(Inner {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
                remote_addr,
                upgrade: Mutex::new(upgrade),
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Case-insensitive header lookup. Returns `None` for absent headers and
    /// for values that are not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Takes the pending upgrade, if the transport offered one. Subsequent
    /// calls return `None`.
    pub(crate) fn take_upgrade(&self) -> Option<OnUpgrade> {
        self.inner.upgrade.lock().ok().and_then(|mut u| u.take())
    }
}
