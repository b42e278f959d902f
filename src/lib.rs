//! workhall - multi-worker HTTP server runtime built on Tokio and hyper.
//!
//! Raw HTTP exchanges are translated into immutable [`Request`] values, run
//! through a middleware pipeline and a routing collaborator, and the
//! resulting [`Response`] is written back. Every failure is contained at the
//! connection boundary: a routing miss becomes an empty 404, anything else an
//! empty 500, and the worker keeps serving.
//!
//! # Features
//!
//! - **Worker pool**: N workers, each a thread with its own single-threaded
//!   event loop, sharing one listening socket
//! - **Immutable messages**: `with_*` derivations never alias the original
//! - **Middleware pipeline**: declaration order, outermost first
//! - **Periodic jobs**: run on dedicated workers, isolated from HTTP traffic
//! - **HTTP/1.1 and HTTP/2**: automatic protocol detection
//!
//! # Example
//!
//! ```rust,ignore
//! use workhall::config::Settings;
//! use workhall::core::Response;
//! use workhall::ServerRuntime;
//!
//! let mut runtime = ServerRuntime::new();
//! runtime.initialize(&Settings::new().set("port", 8080))?;
//! runtime.add_route(http::Method::GET, "/", |_req| Ok(Response::ok("Hello")))?;
//! runtime.start()?;
//! runtime.wait();
//! ```

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Value of the default `Server` response header and `SERVER_SOFTWARE`.
pub const SERVER_SOFTWARE: &str = concat!("Workhall v", env!("CARGO_PKG_VERSION"));

pub mod config;
pub mod core;
pub mod jobs;
pub mod logging;
pub mod middleware;
pub mod routing;
pub mod server;
pub mod types;

// Re-exports for convenience
pub use config::{Config, Settings};
pub use core::{DispatchError, HandlerError, Request, Response};
pub use jobs::WorkerJob;
pub use routing::{RouteTable, Router};
pub use server::{run_all, RuntimeError, ServerRuntime, ShutdownHandle};
