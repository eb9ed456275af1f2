//! The fake request handed to middleware under test.
//!
//! Every container a framework request carries — params, query, headers,
//! cookies, body — exists here, empty by default and writable through
//! [`Request::update`]. Middleware reads them through the same accessors it
//! would use against a real request; there is no connection behind any of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::{HeaderMap, Method};
use serde_json::Value;

/// The mutable innards of a [`Request`].
///
/// Exposed directly so setup closures can shape the request however the test
/// needs: `req.update(|parts| { parts.params.insert("id".into(), "42".into()); })`.
#[derive(Debug)]
pub struct RequestParts {
    /// Request method. `GET` unless the setup says otherwise.
    pub method: Method,
    /// Request headers; lookups through [`Request::header`] are
    /// case-insensitive, as header lookups should be.
    pub headers: HeaderMap,
    /// Route parameters, e.g. `{id}` from `/users/{id}`.
    pub params: HashMap<String, String>,
    /// Decoded query-string pairs.
    pub query: HashMap<String, String>,
    /// Plain cookies.
    pub cookies: HashMap<String, String>,
    /// Cookies that passed signature verification.
    pub signed_cookies: HashMap<String, String>,
    /// Parsed request body. An empty JSON object unless the setup fills it.
    pub body: Value,
    /// Application-level settings the middleware may consult.
    pub app: HashMap<String, Value>,
    /// Metadata about the matched route.
    pub route: HashMap<String, Value>,
}

impl Default for RequestParts {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            query: HashMap::new(),
            cookies: HashMap::new(),
            signed_cookies: HashMap::new(),
            body: Value::Object(serde_json::Map::new()),
            app: HashMap::new(),
            route: HashMap::new(),
        }
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A capability-compatible stand-in for a framework request.
///
/// `Request` is a cheap shared handle: the clone the middleware owns, the
/// clone the setup mutates, and the clone returned in the
/// [`Outcome`](crate::Outcome) are all the same object, so mutations made
/// anywhere are visible everywhere — which is the whole point of a fake.
#[derive(Clone, Debug, Default)]
pub struct Request {
    parts: Arc<Mutex<RequestParts>>,
}

impl Request {
    /// A fresh request with every container empty. Cannot fail.
    pub fn new() -> Self {
        Self::default()
    }

    fn parts(&self) -> MutexGuard<'_, RequestParts> {
        self.parts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates the request in place. The setup phase's main tool.
    pub fn update<R>(&self, f: impl FnOnce(&mut RequestParts) -> R) -> R {
        f(&mut self.parts())
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.parts().method.clone()
    }

    /// Case-insensitive header lookup. `None` for absent or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<String> {
        self.parts()
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    /// Returns a named route parameter.
    pub fn param(&self, key: &str) -> Option<String> {
        self.parts().params.get(key).cloned()
    }

    /// Returns a named query-string value.
    pub fn query(&self, key: &str) -> Option<String> {
        self.parts().query.get(key).cloned()
    }

    /// Returns a named cookie.
    pub fn cookie(&self, key: &str) -> Option<String> {
        self.parts().cookies.get(key).cloned()
    }

    /// Returns a named signed cookie.
    pub fn signed_cookie(&self, key: &str) -> Option<String> {
        self.parts().signed_cookies.get(key).cloned()
    }

    /// A snapshot of the parsed body.
    pub fn body(&self) -> Value {
        self.parts().body.clone()
    }
}
