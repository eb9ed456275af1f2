//! Middleware traits and type erasure.
//!
//! # The two calling conventions
//!
//! Frameworks distinguish ordinary middleware from error-handling middleware,
//! which receives the upstream error as an extra leading argument. Here the
//! distinction is an explicit, caller-chosen mode — you pick the trait by
//! picking the constructor:
//!
//! ```text
//! Runner::new(mw)             mw: Fn(Request, Response, Next) -> Future
//! Runner::error_handling(mw)  mw: Fn(Option<BoxError>, Request, Response, Next) -> Future
//! ```
//!
//! # How middleware is stored
//!
//! The runner needs to hold whichever concrete middleware type the caller
//! hands it, so each trait erases to a boxed trait object:
//!
//! ```text
//! async fn mw(req: Request, res: Response, next: Next) -> Result<(), BoxError>
//!        ↓ Runner::new(mw)
//! mw.into_boxed()                      ← Middleware blanket impl
//!        ↓
//! Box::new(FnMiddleware(mw))           ← stored as BoxedMiddleware
//!        ↓ at run time
//! Box::pin(mw(req, res, next))         ← one boxed future per run
//! ```
//!
//! A `Box` rather than the `Arc` a server would use: a runner invokes its
//! middleware exactly once instead of sharing it across requests.

use std::future::Future;
use std::pin::Pin;

use crate::completion::Next;
use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased middleware future.
///
/// `Pin<Box<…>>` because the future is polled in place; `Send + 'static` so
/// the run can be driven from any async runtime.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// Internal dispatch interface for standard middleware.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Middleware` trait's `into_boxed` method.
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture;
}

/// Internal dispatch interface for error-handling middleware.
#[doc(hidden)]
pub trait ErasedErrorMiddleware {
    fn call(&self, error: Option<BoxError>, req: Request, res: Response, next: Next) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedMiddleware = Box<dyn ErasedMiddleware + Send + Sync + 'static>;

#[doc(hidden)]
pub type BoxedErrorMiddleware = Box<dyn ErasedErrorMiddleware + Send + Sync + 'static>;

// ── Public traits ─────────────────────────────────────────────────────────────

/// Implemented for every valid standard middleware.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the signature:
///
/// ```text
/// async fn name(req: Request, res: Response, next: Next) -> Result<(), BoxError>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Middleware: private::SealedMiddleware + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed(self) -> BoxedMiddleware;
}

/// Implemented for every valid error-handling middleware — the convention
/// that takes the upstream error as an extra leading argument:
///
/// ```text
/// async fn name(error: Option<BoxError>, req: Request, res: Response, next: Next)
///     -> Result<(), BoxError>
/// ```
///
/// Sealed, like [`Middleware`].
pub trait ErrorMiddleware: private::SealedErrorMiddleware + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed(self) -> BoxedErrorMiddleware;
}

/// The sealing module. Two traits because coherence forbids two blanket
/// impls of a single `Sealed` on `F`.
mod private {
    pub trait SealedMiddleware {}
    pub trait SealedErrorMiddleware {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut> private::SealedMiddleware for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn into_boxed(self) -> BoxedMiddleware {
        Box::new(FnMiddleware(self))
    }
}

impl<F, Fut> private::SealedErrorMiddleware for F
where
    F: Fn(Option<BoxError>, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
}

impl<F, Fut> ErrorMiddleware for F
where
    F: Fn(Option<BoxError>, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn into_boxed(self) -> BoxedErrorMiddleware {
        Box::new(FnErrorMiddleware(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Newtype bridging a concrete standard middleware to the trait-object world.
struct FnMiddleware<F>(F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> BoxFuture {
        Box::pin((self.0)(req, res, next))
    }
}

/// Newtype bridging a concrete error-handling middleware.
struct FnErrorMiddleware<F>(F);

impl<F, Fut> ErasedErrorMiddleware for FnErrorMiddleware<F>
where
    F: Fn(Option<BoxError>, Request, Response, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn call(&self, error: Option<BoxError>, req: Request, res: Response, next: Next) -> BoxFuture {
        Box::pin((self.0)(error, req, res, next))
    }
}
