//! Route groups and flattening.
//!
//! A [`RouteGroup`] is a tree node: a path prefix, an ordered route list,
//! and before/after middleware lists. Groups compose by nesting —
//! [`RouteGroup::add_group`] *flattens* the child into the parent: the
//! child's own prefix and middleware are baked into its routes first, then
//! the parent's prefix is prepended and the parent's middleware wrapped
//! outside. Child middleware therefore runs closest to the handler, and the
//! final mounted table is flat: no group references another.
//!
//! ```rust,no_run
//! use rove::{Ctx, Error, Reply, Request, RouteGroup};
//!
//! async fn me(_req: Request, _ctx: Ctx) -> Result<Reply<&'static str>, Error> {
//!     Ok(Reply(200, "it me"))
//! }
//!
//! let v1 = RouteGroup::new("/v1").get("/me", me);
//! let api = RouteGroup::new("/api").add_group(v1);
//! // mounts as GET /api/v1/me
//! ```

use http::Method;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{After, Before, BoxedAfter, BoxedBefore, Chain};
use crate::ws::{WsHandler, WsRoute};

/// One registered route: method, group-relative path, terminal handler.
pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: BoxedHandler,
}

/// A group of routes sharing a path prefix and middleware set.
///
/// Registration methods consume and return the group, so building chains
/// naturally. Path parameters use `{name}` syntax and are read with
/// [`Ctx::param`](crate::Ctx::param).
pub struct RouteGroup {
    prefix: String,
    routes: Vec<Route>,
    before: Vec<BoxedBefore>,
    after: Vec<BoxedAfter>,
}

impl RouteGroup {
    /// Creates an empty group. The prefix may be empty (the root group);
    /// a missing leading `/` is inserted.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            routes: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::DELETE, path, handler)
    }

    pub fn head(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::HEAD, path, handler)
    }

    pub fn options(self, path: &str, handler: impl Handler) -> Self {
        self.handle(Method::OPTIONS, path, handler)
    }

    /// Registers a handler for an arbitrary method + path pair.
    pub fn handle(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_owned(),
            handler: handler.into_boxed_handler(),
        });
        self
    }

    /// Registers a websocket route (served over GET, per RFC 6455).
    pub fn websocket(mut self, path: &str, handler: impl WsHandler) -> Self {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_owned(),
            handler: WsRoute::into_handler(handler),
        });
        self
    }

    /// Appends before-middleware, applied to every handler in the group.
    /// The first registered runs first.
    pub fn before(mut self, mw: impl Before) -> Self {
        self.before.push(mw.into_boxed_before());
        self
    }

    /// Appends after-middleware, run in registration order once the handler
    /// has produced a value.
    pub fn after(mut self, mw: impl After) -> Self {
        self.after.push(mw.into_boxed_after());
        self
    }

    /// Flattens `sub` into this group as a subgroup: the resulting paths are
    /// `/self.prefix/sub.prefix/route/path`, with `sub`'s middleware wrapped
    /// closest to each handler.
    pub fn add_group(mut self, sub: RouteGroup) -> Self {
        self.routes.extend(sub.flatten());
        self
    }

    /// Bakes this group's prefix and middleware into its routes, preserving
    /// registration order. Recursion happens naturally because `add_group`
    /// flattens children on the way in; flattening a group with an empty
    /// prefix and no middleware is a no-op on its routes.
    pub(crate) fn flatten(self) -> Vec<Route> {
        let Self { prefix, routes, before, after } = self;

        routes
            .into_iter()
            .map(|route| Route {
                method: route.method,
                path: join_paths(&prefix, &route.path),
                handler: Chain::wrap(route.handler, before.clone(), after.clone()),
            })
            .collect()
    }
}

/// Joins a group prefix and a route path. An empty prefix introduces no
/// separator; missing leading slashes are inserted; doubled separators are
/// collapsed at the seam.
fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = ensure_leading_slash(prefix);
    let path = ensure_leading_slash(path);

    format!("{}{}", prefix.trim_end_matches('/'), path)
}

fn ensure_leading_slash(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Ctx;
    use crate::error::Error;
    use crate::request::Request;

    async fn noop(_req: Request, _ctx: Ctx) -> Result<(), Error> {
        Ok(())
    }

    fn paths(routes: &[Route]) -> Vec<(String, String)> {
        routes
            .iter()
            .map(|r| (r.method.to_string(), r.path.clone()))
            .collect()
    }

    #[test]
    fn nested_groups_flatten_to_fully_qualified_paths() {
        let v1 = RouteGroup::new("/v1").get("/me", noop);
        let api = RouteGroup::new("/api").add_group(v1);

        let routes = api.flatten();
        assert_eq!(paths(&routes), vec![("GET".to_owned(), "/api/v1/me".to_owned())]);
    }

    #[test]
    fn flattening_is_idempotent() {
        let v1 = RouteGroup::new("v1").get("me", noop);
        let api = RouteGroup::new("api").add_group(v1);

        let flat = api.flatten();

        // re-absorb the flat table into a root group: nothing changes
        let mut root = RouteGroup::new("");
        root.routes = flat;
        let reflat = root.flatten();

        assert_eq!(paths(&reflat), vec![("GET".to_owned(), "/api/v1/me".to_owned())]);
    }

    #[test]
    fn empty_prefix_introduces_no_separator() {
        let root = RouteGroup::new("").get("/healthz", noop);
        let routes = root.flatten();

        assert_eq!(routes[0].path, "/healthz");
    }

    #[test]
    fn missing_leading_slashes_are_inserted() {
        let group = RouteGroup::new("api").get("users", noop);
        let routes = group.flatten();

        assert_eq!(routes[0].path, "/api/users");
    }

    #[test]
    fn doubled_separators_are_collapsed() {
        let group = RouteGroup::new("/api/").get("/users", noop);
        let routes = group.flatten();

        assert_eq!(routes[0].path, "/api/users");
    }

    #[test]
    fn registration_order_is_preserved() {
        let sub = RouteGroup::new("/sub").get("/one", noop).post("/two", noop);
        let group = RouteGroup::new("/g")
            .get("/first", noop)
            .add_group(sub)
            .delete("/last", noop);

        let routes = group.flatten();
        assert_eq!(
            paths(&routes),
            vec![
                ("GET".to_owned(), "/g/first".to_owned()),
                ("GET".to_owned(), "/g/sub/one".to_owned()),
                ("POST".to_owned(), "/g/sub/two".to_owned()),
                ("DELETE".to_owned(), "/g/last".to_owned()),
            ],
        );
    }
}
