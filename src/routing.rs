//! Request routing.
//!
//! The runtime only needs something that turns a [`Request`] into a
//! [`Response`] or reports that nothing matched. [`RouteTable`] is the
//! built-in exact-match implementation; applications can plug in their
//! own [`Router`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::core::{DispatchError, HandlerError, Request, Response};

/// Terminal request handler.
pub type Handler = Arc<dyn Fn(Request) -> Result<Response, HandlerError> + Send + Sync>;

/// Final stage of the pipeline.
pub trait Router: Send + Sync {
    /// Produce a response, or [`DispatchError::NotFound`] when no route matches.
    fn handle(&self, req: Request) -> Result<Response, DispatchError>;
}

impl<F> Router for F
where
    F: Fn(Request) -> Result<Response, DispatchError> + Send + Sync,
{
    fn handle(&self, req: Request) -> Result<Response, DispatchError> {
        self(req)
    }
}

/// Exact `(method, path)` route table.
///
/// Paths are compared after percent-decoding. `HEAD` falls back to the
/// `GET` handler when no explicit `HEAD` route exists.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<Method, HashMap<String, Handler>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` and `path`, replacing any previous one.
    pub fn add<F>(&mut self, method: Method, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        self.insert(method, path.into(), Arc::new(handler));
        self
    }

    pub fn get<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        self.add(Method::GET, path, handler)
    }

    pub fn post<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        self.add(Method::POST, path, handler)
    }

    pub fn put<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        self.add(Method::PUT, path, handler)
    }

    pub fn delete<F>(&mut self, path: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        self.add(Method::DELETE, path, handler)
    }

    /// Copy every route of `other` under `prefix`.
    ///
    /// `mount("/api", t)` turns `/users` into `/api/users` and `/` into `/api`.
    pub fn mount(&mut self, prefix: &str, other: &RouteTable) -> &mut Self {
        let prefix = prefix.trim_end_matches('/');
        for (method, paths) in &other.routes {
            for (path, handler) in paths {
                let full = match path.as_str() {
                    "/" if !prefix.is_empty() => prefix.to_string(),
                    _ => format!("{}{}", prefix, path),
                };
                self.insert(method.clone(), full, Arc::clone(handler));
            }
        }
        self
    }

    fn insert(&mut self, method: Method, path: String, handler: Handler) {
        tracing::trace!(method = %method, path = path.as_str(), "route registered");
        self.routes.entry(method).or_default().insert(path, handler);
    }

    /// Total number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<&Handler> {
        let found = self.routes.get(method).and_then(|paths| paths.get(path));
        match found {
            None if method == Method::HEAD => self.lookup(&Method::GET, path),
            other => other,
        }
    }
}

impl Router for RouteTable {
    fn handle(&self, req: Request) -> Result<Response, DispatchError> {
        let path = percent_encoding::percent_decode_str(req.path())
            .decode_utf8_lossy()
            .into_owned();

        match self.lookup(req.method(), &path) {
            Some(handler) => handler(req).map_err(DispatchError::Failed),
            None => Err(DispatchError::NotFound),
        }
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<String> = self
            .routes
            .iter()
            .flat_map(|(m, paths)| paths.keys().map(move |p| format!("{} {}", m, p)))
            .collect();
        routes.sort_unstable();
        f.debug_struct("RouteTable").field("routes", &routes).finish()
    }
}
