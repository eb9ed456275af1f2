//! # drydock
//!
//! Unit-test one middleware in isolation — no server, no socket, no router.
//! Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Your integration suite owns the real server: routing, parsing, TLS, the
//! whole stack. drydock does not — by design. It answers the one question a
//! unit test asks of a middleware: *given this request, does it do the right
//! thing?* It fabricates a [`Request`] and a [`Response`], hands them to the
//! middleware together with a [`Next`] continuation, and detects completion
//! through whichever signal fires first:
//!
//! - the middleware calls [`Next::advance`] (with or without an error),
//! - the middleware calls a terminal [`Response`] method (`end`, `send`,
//!   `json`, `send_status`, `redirect`),
//! - the middleware's future settles on its own.
//!
//! What drydock intentionally does not do:
//!
//! - **Serve HTTP** — no listener, no connection, ever
//! - **Route** — there is exactly one middleware per run
//! - **Assert** — bring your own assertions; a failing check's error is
//!   returned exactly as thrown
//!
//! ## Quick start
//!
//! ```rust
//! use drydock::{BoxError, Next, Request, Response, Runner};
//! use http::StatusCode;
//!
//! // The middleware under test: rejects requests with no `user` param.
//! async fn require_user(req: Request, res: Response, next: Next) -> Result<(), BoxError> {
//!     match req.param("user") {
//!         Some(_) => next.advance(None),
//!         None => res.send_status(StatusCode::UNAUTHORIZED),
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // Anonymous request: the middleware must end the response.
//!     let outcome = Runner::new(require_user).run().await.unwrap();
//!     assert_eq!(outcome.response.status_code(), StatusCode::UNAUTHORIZED);
//!
//!     // Known user: the middleware must pass the request along.
//!     let outcome = Runner::new(require_user)
//!         .setup(|req, _res| {
//!             req.update(|parts| {
//!                 parts.params.insert("user".into(), "alice".into());
//!             });
//!             Ok(())
//!         })
//!         .run()
//!         .await
//!         .unwrap();
//!     assert!(outcome.error.is_none());
//!     assert!(!outcome.response.ended());
//! }
//! ```
//!
//! Error-handling middleware — the convention with a leading error argument —
//! is an explicit mode, not something sniffed from a signature:
//!
//! ```rust
//! use drydock::{BoxError, Next, Request, Response, Runner};
//!
//! async fn report(err: Option<BoxError>, _req: Request, res: Response, _next: Next)
//!     -> Result<(), BoxError>
//! {
//!     let message = err.map_or_else(|| "ok".to_owned(), |e| e.to_string());
//!     res.send(message);
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let outcome = Runner::error_handling(report)
//!         .setup(|_req, _res| Err("upstream exploded".into()))
//!         .run()
//!         .await
//!         .unwrap();
//!     assert_eq!(outcome.response.body().as_deref(), Some(b"upstream exploded".as_slice()));
//! }
//! ```

mod completion;
mod error;
mod middleware;
mod request;
mod response;
mod runner;

pub use completion::Next;
pub use error::{BoxError, Error};
pub use middleware::{ErrorMiddleware, Middleware};
pub use request::{Request, RequestParts};
pub use response::{Response, ResponseParts};
pub use runner::{run, Outcome, Runner};
