//! The fake response handed to middleware under test.
//!
//! Methods come in exactly two kinds, and the table is fixed — no reflection,
//! no surprises:
//!
//! | Method                      | Kind      | Effect                                              |
//! |-----------------------------|-----------|------------------------------------------------------|
//! | [`status`](Response::status)           | chainable | records the status code, returns `&Self` |
//! | [`vary`](Response::vary)               | chainable | appends to the `vary` header, returns `&Self` |
//! | [`end`](Response::end)                 | terminal  | completes the run                        |
//! | [`send`](Response::send)               | terminal  | records a byte body, completes the run   |
//! | [`json`](Response::json)               | terminal  | records a JSON body, completes the run   |
//! | [`send_status`](Response::send_status) | terminal  | records the status, completes the run    |
//! | [`redirect`](Response::redirect)       | terminal  | records a 302 + location, completes the run |
//!
//! A terminal method stands in for "the middleware ended the response": it
//! records what would have been written and signals successful completion to
//! the harness. Nothing touches a socket. Everything recorded stays readable
//! afterwards for assertions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde_json::Value;

use crate::completion::Completion;

/// The mutable innards of a [`Response`].
///
/// Exposed for setup closures via [`Response::update`], same as the request.
#[derive(Debug)]
pub struct ResponseParts {
    /// Application-level settings, mirroring the request's view.
    pub app: HashMap<String, Value>,
    /// Per-request scratch space middleware conventionally writes to.
    pub locals: HashMap<String, Value>,
    /// Recorded status code. `200 OK` until a middleware says otherwise.
    pub status: StatusCode,
    /// Recorded headers.
    pub headers: HeaderMap,
    /// Recorded body, if a terminal method supplied one.
    pub body: Option<Bytes>,
    /// Whether a terminal method has run. Private: only terminal methods may
    /// flip it, so `ended()` always means what it says.
    pub(crate) finished: bool,
}

impl Default for ResponseParts {
    fn default() -> Self {
        Self {
            app: HashMap::new(),
            locals: HashMap::new(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            finished: false,
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// A capability-compatible stand-in for a framework response.
///
/// Like [`Request`](crate::Request), a cheap shared handle: the middleware's
/// clone and the outcome's clone are the same object. Chainable methods
/// support the usual fluent style:
///
/// ```rust
/// use drydock::Response;
/// use http::StatusCode;
///
/// let res = Response::new();
/// res.status(StatusCode::CREATED).end();
/// assert!(res.ended());
/// assert_eq!(res.status_code(), StatusCode::CREATED);
/// ```
#[derive(Clone)]
pub struct Response {
    parts: Arc<Mutex<ResponseParts>>,
    completion: Completion,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("parts", &*self.parts())
            .finish_non_exhaustive()
    }
}

impl Response {
    /// A fresh standalone response. Cannot fail.
    ///
    /// Standalone responses carry their own private completion state, so the
    /// fake is fully usable outside a [`Runner`](crate::Runner).
    pub fn new() -> Self {
        Self::attached(Completion::new())
    }

    /// A response wired to a run's completion state.
    pub(crate) fn attached(completion: Completion) -> Self {
        Self {
            parts: Arc::new(Mutex::new(ResponseParts::default())),
            completion,
        }
    }

    fn parts(&self) -> MutexGuard<'_, ResponseParts> {
        self.parts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates the response in place, for the setup phase.
    pub fn update<R>(&self, f: impl FnOnce(&mut ResponseParts) -> R) -> R {
        f(&mut self.parts())
    }

    // ── Chainable methods ─────────────────────────────────────────────────────

    /// Records the status code. Chainable: `res.status(code).end()`.
    pub fn status(&self, code: StatusCode) -> &Self {
        self.parts().status = code;
        self
    }

    /// Appends `value` to the `vary` header. Chainable.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not a valid header value.
    pub fn vary(&self, value: &str) -> &Self {
        let value = HeaderValue::from_str(value)
            .unwrap_or_else(|e| panic!("invalid vary value `{value}`: {e}"));
        self.parts().headers.append(header::VARY, value);
        self
    }

    // ── Terminal methods ──────────────────────────────────────────────────────

    /// Ends the response with no body and completes the run.
    pub fn end(&self) {
        self.terminate("end");
    }

    /// Records `body` and completes the run.
    pub fn send(&self, body: impl Into<Bytes>) {
        self.parts().body = Some(body.into());
        self.terminate("send");
    }

    /// Records `body` as JSON (with a `content-type` to match) and completes
    /// the run.
    pub fn json(&self, body: Value) {
        {
            let mut parts = self.parts();
            parts.body = Some(Bytes::from(body.to_string()));
            parts
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self.terminate("json");
    }

    /// Records `code` and completes the run.
    pub fn send_status(&self, code: StatusCode) {
        self.parts().status = code;
        self.terminate("send_status");
    }

    /// Records a `302 Found` with a `location` header and completes the run.
    ///
    /// # Panics
    ///
    /// Panics if `location` is not a valid header value.
    pub fn redirect(&self, location: &str) {
        let value = HeaderValue::from_str(location)
            .unwrap_or_else(|e| panic!("invalid redirect location `{location}`: {e}"));
        {
            let mut parts = self.parts();
            parts.status = StatusCode::FOUND;
            parts.headers.insert(header::LOCATION, value);
        }
        self.terminate("redirect");
    }

    fn terminate(&self, method: &'static str) {
        self.parts().finished = true;
        self.completion.response_signal(method);
    }

    // ── Recorded output ───────────────────────────────────────────────────────

    /// Whether a terminal method has run.
    pub fn ended(&self) -> bool {
        self.parts().finished
    }

    /// The recorded status code.
    pub fn status_code(&self) -> StatusCode {
        self.parts().status
    }

    /// Case-insensitive lookup of a recorded header.
    pub fn header(&self, name: &str) -> Option<String> {
        self.parts()
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    /// The recorded body, if a terminal method supplied one.
    pub fn body(&self) -> Option<Bytes> {
        self.parts().body.clone()
    }

    /// Reads a value out of `locals`.
    pub fn local(&self, key: &str) -> Option<Value> {
        self.parts().locals.get(key).cloned()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_response_is_unfinished_and_empty() {
        let res = Response::new();
        assert!(!res.ended());
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_none());
        res.update(|parts| {
            assert!(parts.app.is_empty());
            assert!(parts.locals.is_empty());
        });
    }

    #[test]
    fn chainables_chain_and_record() {
        let res = Response::new();
        res.status(StatusCode::CREATED).vary("accept").end();
        assert!(res.ended());
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("vary").as_deref(), Some("accept"));
    }

    #[test]
    fn vary_appends_rather_than_replaces() {
        let res = Response::new();
        res.vary("accept").vary("accept-encoding");
        res.update(|parts| {
            let values: Vec<_> = parts.headers.get_all(header::VARY).iter().collect();
            assert_eq!(values.len(), 2);
        });
    }

    #[test]
    fn json_records_body_and_content_type() {
        let res = Response::new();
        res.json(serde_json::json!({ "id": 7 }));
        assert!(res.ended());
        assert_eq!(res.header("content-type").as_deref(), Some("application/json"));
        assert_eq!(res.body().as_deref(), Some(br#"{"id":7}"#.as_slice()));
    }

    #[test]
    fn send_status_records_the_code() {
        let res = Response::new();
        res.send_status(StatusCode::UNAUTHORIZED);
        assert!(res.ended());
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn redirect_records_location_and_found() {
        let res = Response::new();
        res.redirect("/login");
        assert!(res.ended());
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header("location").as_deref(), Some("/login"));
    }
}
