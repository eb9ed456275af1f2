//! The runner: setup → middleware → completion → outcome.
//!
//! One [`Runner`] drives one middleware invocation. It fabricates the fakes,
//! lets the setup shape them, invokes the middleware in the selected calling
//! convention, awaits its future, and reconciles whichever completion signal
//! fired first into a single [`Outcome`]. Runs share nothing: every call to
//! [`Runner::run`] allocates its own request, response, and completion state,
//! so concurrent runs cannot interfere.

use tracing::debug;

use crate::completion::{Completion, Next};
use crate::error::BoxError;
use crate::middleware::{BoxedErrorMiddleware, BoxedMiddleware, ErrorMiddleware, Middleware};
use crate::request::Request;
use crate::response::Response;

type Setup = Box<dyn FnOnce(&Request, &Response) -> Result<(), BoxError> + Send>;
type Check = Box<dyn FnOnce(Option<&BoxError>, &Request, &Response) -> Result<(), BoxError> + Send>;

/// Which calling convention the middleware was registered under.
enum Kind {
    Standard(BoxedMiddleware),
    ErrorHandling(BoxedErrorMiddleware),
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// The result of a completed run: the error slot plus the very request and
/// response the middleware saw.
#[derive(Debug)]
pub struct Outcome {
    /// `None` for a clean completion; `Some` if the middleware forwarded an
    /// error through its continuation (or a setup seed survived untouched).
    pub error: Option<BoxError>,
    /// The request the middleware ran against, mutations included.
    pub request: Request,
    /// The response the middleware ran against, recorded output included.
    pub response: Response,
}

impl Outcome {
    /// Destructures into the ordered `(error, request, response)` triple.
    pub fn into_parts(self) -> (Option<BoxError>, Request, Response) {
        (self.error, self.request, self.response)
    }
}

// ── Runner ────────────────────────────────────────────────────────────────────

/// Drives one middleware to completion against fabricated request/response
/// objects.
///
/// ```rust
/// use drydock::{BoxError, Next, Request, Response, Runner};
///
/// async fn tag_request(_req: Request, res: Response, next: Next) -> Result<(), BoxError> {
///     res.update(|parts| {
///         parts.locals.insert("tagged".into(), serde_json::json!(true));
///     });
///     next.advance(None);
///     Ok(())
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let outcome = Runner::new(tag_request).run().await.unwrap();
/// assert!(outcome.error.is_none());
/// assert_eq!(outcome.response.local("tagged"), Some(serde_json::json!(true)));
/// # }
/// ```
pub struct Runner {
    kind: Kind,
    setup: Option<Setup>,
    check: Option<Check>,
}

impl Runner {
    /// A runner for standard middleware: `(req, res, next)`.
    pub fn new(middleware: impl Middleware) -> Self {
        Self {
            kind: Kind::Standard(middleware.into_boxed()),
            setup: None,
            check: None,
        }
    }

    /// A runner for error-handling middleware: `(error, req, res, next)`.
    ///
    /// The middleware's first argument is whatever error the setup injected,
    /// moved in — exactly what a framework would route to it.
    pub fn error_handling(middleware: impl ErrorMiddleware) -> Self {
        Self {
            kind: Kind::ErrorHandling(middleware.into_boxed()),
            setup: None,
            check: None,
        }
    }

    /// Registers a setup closure, run strictly before the middleware.
    ///
    /// Use it to pre-populate the fakes. Returning `Err` injects a
    /// pre-existing error into the run — the input for
    /// [`error_handling`](Runner::error_handling) middleware.
    pub fn setup(
        mut self,
        setup: impl FnOnce(&Request, &Response) -> Result<(), BoxError> + Send + 'static,
    ) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    /// Registers a check, invoked exactly once at the moment the run
    /// completes — which may be *during* the middleware, if it signals
    /// completion and keeps working.
    ///
    /// A check that returns `Err` fails the run with that exact error,
    /// untouched, so assertion errors surface under their own type.
    pub fn check(
        mut self,
        check: impl FnOnce(Option<&BoxError>, &Request, &Response) -> Result<(), BoxError>
        + Send
        + 'static,
    ) -> Self {
        self.check = Some(Box::new(check));
        self
    }

    /// Runs the middleware to completion.
    ///
    /// Settles only after the middleware future settles and the check (if
    /// any) has run. A middleware that never signals completion *and* never
    /// finishes its future will keep this pending forever; there is no
    /// timeout.
    pub async fn run(self) -> Result<Outcome, BoxError> {
        let completion = Completion::new();
        let request = Request::new();
        let response = Response::attached(completion.clone());

        if let Some(check) = self.check {
            let (req, res) = (request.clone(), response.clone());
            completion.install_check(Box::new(move |error| check(error, &req, &res)));
        }

        if let Some(setup) = self.setup {
            if let Err(error) = setup(&request, &response) {
                debug!(%error, "setup injected an error");
                completion.seed_error(error);
            }
        }

        let next = Next::new(completion.clone());
        let result = match self.kind {
            Kind::Standard(middleware) => {
                debug!("invoking middleware");
                middleware.call(request.clone(), response.clone(), next).await
            }
            Kind::ErrorHandling(middleware) => {
                let error = completion.take_error();
                debug!(seeded_error = error.is_some(), "invoking error-handling middleware");
                middleware
                    .call(error, request.clone(), response.clone(), next)
                    .await
            }
        };

        let error = completion.reconcile(result)?;
        Ok(Outcome { error, request, response })
    }
}

/// Shorthand for running a standard middleware with no setup and no check.
///
/// Equivalent to `Runner::new(middleware).run()`.
pub async fn run(middleware: impl Middleware) -> Result<Outcome, BoxError> {
    Runner::new(middleware).run().await
}
