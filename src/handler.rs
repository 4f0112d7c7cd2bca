//! Handler trait and type erasure.
//!
//! The route table stores handlers of *different* concrete types in one
//! structure, so each handler is hidden behind a trait object
//! (`dyn ErasedHandler`) and shared as an `Arc`. The chain from user code to
//! vtable call:
//!
//! ```text
//! async fn me(req: Request, ctx: Ctx) -> Result<Json<Me>, Error> { … }
//!        ↓ group.get("/me", me)
//! me.into_boxed_handler()                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(me))                 ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req, ctx)  at request time ← one vtable dispatch
//!        ↓
//! Box::pin(async { me(req, ctx).await.and_then(IntoValue::into_value) })
//! ```
//!
//! Runtime cost per request: one Arc clone and one virtual call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Ctx;
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoValue, Value};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send +
/// 'static` so tokio may move it across worker threads.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's method. External crates
/// cannot usefully interact with it.
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync {
    fn call(&self, req: Request, ctx: Ctx) -> BoxFuture<Result<Value, Error>>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself; it is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request, ctx: Ctx) -> Result<impl IntoValue, Error>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it,
/// which keeps the API surface stable across versions.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoValue + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request, Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoValue + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype holding a concrete handler `F`, bridging the typed world to the
/// trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Ctx) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoValue + Send + 'static,
{
    fn call(&self, req: Request, ctx: Ctx) -> BoxFuture<Result<Value, Error>> {
        let fut = (self.0)(req, ctx);
        Box::pin(async move { fut.await.and_then(IntoValue::into_value) })
    }
}
