//! Core types for HTTP request/response handling.
//!
//! This module provides the immutable message model shared by the
//! translator, the middleware pipeline and application handlers:
//!
//! - [`Request`] - immutable request with copy-on-write derivations
//! - [`Response`] - immutable response with builder
//! - [`Headers`] - ordered, case-insensitive, multi-value header map
//! - [`Error`], [`HandlerError`], [`DispatchError`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use workhall::core::{Request, Response, HandlerError};
//!
//! fn handle(req: Request) -> Result<Response, HandlerError> {
//!     let req = req.with_attribute("seen", true)?;
//!     Ok(Response::ok("Hello, World!").with_header("X-Seen", "1"))
//! }
//! ```

mod error;
mod headers;
mod request;
mod response;

pub use error::{DispatchError, Error, HandlerError, Result};
pub use headers::Headers;
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder};
