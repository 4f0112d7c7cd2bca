//! Middleware and chain composition.
//!
//! Two middleware shapes exist:
//!
//! - **Before** — `async (Request, Ctx) -> Result<(), Error>`. Runs ahead of
//!   the handler in registration order. Returning `Err` short-circuits: no
//!   later before-middleware, not the handler, and none of the
//!   after-middleware run; the error goes straight to normalization.
//! - **After** — `async (Request, Ctx, Value) -> Result<Value, Error>`. Runs
//!   after a successful handler in registration order, receiving the
//!   in-flight value; it may transform it or pass it through. An `Err` stops
//!   the remaining after-middleware.
//!
//! [`Chain::wrap`] turns a handler plus its before/after lists into a single
//! handler of the same shape, so wrapping composes. Group nesting wraps a
//! child's chain inside the parent's, producing onion ordering:
//!
//! ```text
//! outer-before → inner-before → handler → inner-after → outer-after
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::context::Ctx;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;
use crate::response::Value;

// ── Before ────────────────────────────────────────────────────────────────────

/// Implemented for every valid before-middleware:
///
/// ```text
/// async fn name(req: Request, ctx: Ctx) -> Result<(), Error>
/// ```
pub trait Before: before_private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_before(self) -> BoxedBefore;
}

mod before_private {
    pub trait Sealed {}
}

#[doc(hidden)]
pub trait ErasedBefore: Send + Sync {
    fn call(&self, req: Request, ctx: Ctx) -> BoxFuture<Result<(), Error>>;
}

#[doc(hidden)]
pub type BoxedBefore = Arc<dyn ErasedBefore + 'static>;

impl<F, Fut> before_private::Sealed for F
where
    F: Fn(Request, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
}

impl<F, Fut> Before for F
where
    F: Fn(Request, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn into_boxed_before(self) -> BoxedBefore {
        Arc::new(BeforeFn(self))
    }
}

struct BeforeFn<F>(F);

impl<F, Fut> ErasedBefore for BeforeFn<F>
where
    F: Fn(Request, Ctx) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn call(&self, req: Request, ctx: Ctx) -> BoxFuture<Result<(), Error>> {
        Box::pin((self.0)(req, ctx))
    }
}

// ── After ─────────────────────────────────────────────────────────────────────

/// Implemented for every valid after-middleware:
///
/// ```text
/// async fn name(req: Request, ctx: Ctx, value: Value) -> Result<Value, Error>
/// ```
pub trait After: after_private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_after(self) -> BoxedAfter;
}

mod after_private {
    pub trait Sealed {}
}

#[doc(hidden)]
pub trait ErasedAfter: Send + Sync {
    fn call(&self, req: Request, ctx: Ctx, value: Value) -> BoxFuture<Result<Value, Error>>;
}

#[doc(hidden)]
pub type BoxedAfter = Arc<dyn ErasedAfter + 'static>;

impl<F, Fut> after_private::Sealed for F
where
    F: Fn(Request, Ctx, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
}

impl<F, Fut> After for F
where
    F: Fn(Request, Ctx, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    fn into_boxed_after(self) -> BoxedAfter {
        Arc::new(AfterFn(self))
    }
}

struct AfterFn<F>(F);

impl<F, Fut> ErasedAfter for AfterFn<F>
where
    F: Fn(Request, Ctx, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    fn call(&self, req: Request, ctx: Ctx, value: Value) -> BoxFuture<Result<Value, Error>> {
        Box::pin((self.0)(req, ctx, value))
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// A terminal handler wrapped with ordered before/after middleware.
///
/// A `Chain` is itself an [`ErasedHandler`], so a group can wrap an already
/// wrapped route: the outermost chain's before-middleware run first and its
/// after-middleware run last.
pub(crate) struct Chain {
    before: Vec<BoxedBefore>,
    after: Vec<BoxedAfter>,
    inner: BoxedHandler,
}

impl Chain {
    /// Decorates `inner` with the given middleware lists. With both lists
    /// empty, `inner` is returned untouched — wrapping is free for plain
    /// routes and re-wrapping an already flattened table changes nothing.
    pub(crate) fn wrap(
        inner: BoxedHandler,
        before: Vec<BoxedBefore>,
        after: Vec<BoxedAfter>,
    ) -> BoxedHandler {
        if before.is_empty() && after.is_empty() {
            return inner;
        }

        Arc::new(Chain { before, after, inner })
    }
}

impl ErasedHandler for Chain {
    fn call(&self, req: Request, ctx: Ctx) -> BoxFuture<Result<Value, Error>> {
        let before = self.before.clone();
        let after = self.after.clone();
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            for mw in &before {
                mw.call(req.clone(), ctx.clone()).await?;
            }

            let mut value = inner.call(req.clone(), ctx.clone()).await?;

            for mw in &after {
                value = mw.call(req.clone(), ctx.clone(), value).await?;
            }

            Ok(value)
        })
    }
}

// ── Route-local wrapping ──────────────────────────────────────────────────────

/// Wraps before-middleware around a single handler, without a group. The
/// result is itself a handler, so calls nest: the outermost wrap runs first.
///
/// ```rust,no_run
/// use rove::{err, wrap_before, Ctx, Error, Request, RouteGroup};
///
/// async fn admins_only(req: Request, _ctx: Ctx) -> Result<(), Error> {
///     match req.header("x-admin") {
///         Some(_) => Ok(()),
///         None => Err(err(403, "admins only")),
///     }
/// }
///
/// async fn wipe(_req: Request, _ctx: Ctx) -> Result<(), Error> {
///     Ok(())
/// }
///
/// // only this route gets the guard; siblings in the group do not
/// let api = RouteGroup::new("/api").delete("/all", wrap_before(admins_only, wipe));
/// ```
pub fn wrap_before(mw: impl Before, handler: impl Handler) -> impl Handler {
    let chained = Chain::wrap(
        handler.into_boxed_handler(),
        vec![mw.into_boxed_before()],
        Vec::new(),
    );

    move |req: Request, ctx: Ctx| chained.call(req, ctx)
}

/// The after-middleware counterpart of [`wrap_before`].
pub fn wrap_after(mw: impl After, handler: impl Handler) -> impl Handler {
    let chained = Chain::wrap(
        handler.into_boxed_handler(),
        Vec::new(),
        vec![mw.into_boxed_after()],
    );

    move |req: Request, ctx: Ctx| chained.call(req, ctx)
}
