//! Middleware pipeline for request/response processing.
//!
//! Each middleware receives the request by value plus a [`Next`] handle
//! for the rest of the chain. It can:
//! - derive a new request (via the `with_*` family) and pass it on
//! - short-circuit by returning a response without calling `next`
//! - inspect or replace the response coming back from `next`
//!
//! # Lifecycle
//!
//! ```text
//! Request → MW1 → MW2 → Router
//!                         ↓
//! Response ← MW1 ← MW2 ←──┘
//! ```
//!
//! The first middleware added is the outermost wrapper.
//!
//! # Example
//!
//! ```rust,ignore
//! use workhall::middleware::{Middleware, MiddlewareChain, Next};
//! use workhall::core::{DispatchError, Request, Response};
//!
//! struct Tagging;
//!
//! impl Middleware for Tagging {
//!     fn name(&self) -> &'static str { "tagging" }
//!
//!     fn process(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
//!         let res = next.run(req.with_header("X-Tagged", "1"))?;
//!         Ok(res.with_header("X-Tagged", "1"))
//!     }
//! }
//!
//! let chain = MiddlewareChain::new().add(Tagging);
//! ```

mod chain;

pub mod access_log;
pub mod json_body;

pub use access_log::AccessLogMiddleware;
pub use chain::MiddlewareChain;
pub use json_body::JsonBodyParser;

use std::sync::Arc;

use crate::core::{DispatchError, Request, Response};
use crate::routing::Router;

/// Trait for implementing middleware.
pub trait Middleware: Send + Sync {
    /// Unique name for this middleware (used for logging/debugging).
    fn name(&self) -> &'static str;

    /// Process a request, usually by calling `next.run(req)`.
    fn process(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError>;
}

/// The remainder of the chain, ending at the router.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Router,
}

impl<'a> Next<'a> {
    pub(crate) fn new(remaining: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Router) -> Self {
        Self {
            remaining,
            endpoint,
        }
    }

    /// Invoke the rest of the chain with `req`.
    pub fn run(self, req: Request) -> Result<Response, DispatchError> {
        match self.remaining.split_first() {
            Some((mw, rest)) => mw.process(req, Next::new(rest, self.endpoint)),
            None => self.endpoint.handle(req),
        }
    }
}

/// Middleware built from a closure.
pub struct FnMiddleware<F> {
    name: &'static str,
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next<'_>) -> Result<Response, DispatchError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process(&self, req: Request, next: Next<'_>) -> Result<Response, DispatchError> {
        (self.f)(req, next)
    }
}

/// Wrap a closure as middleware.
pub fn from_fn<F>(name: &'static str, f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Next<'_>) -> Result<Response, DispatchError> + Send + Sync,
{
    FnMiddleware { name, f }
}
