//! Middleware chain for composing multiple middleware.

use std::sync::Arc;

use super::{Middleware, Next};
use crate::core::{DispatchError, Request, Response};
use crate::routing::Router;

/// An ordered chain of middleware in front of a router.
///
/// Declaration order is execution order: the first middleware added runs
/// first on the way in and last on the way out.
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware as the innermost layer so far.
    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Add a middleware wrapped in Arc to the chain.
    pub fn add_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// In-place variant of [`MiddlewareChain::add_arc`].
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Get middleware names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run `req` through every middleware and finally `endpoint`.
    pub fn handle(&self, req: Request, endpoint: &dyn Router) -> Result<Response, DispatchError> {
        tracing::trace!(
            method = %req.method(),
            path = req.path(),
            middlewares = self.middlewares.len(),
            "dispatching through middleware chain"
        );
        Next::new(&self.middlewares, endpoint).run(req)
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MiddlewareChain {
    fn clone(&self) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
        }
    }
}
