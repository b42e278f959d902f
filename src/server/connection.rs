//! Per-connection handling and error-to-status mapping.

use std::any::Any;
use std::cell::Cell;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::{self, catch_unwind, AssertUnwindSafe, PanicHookInfo};
use std::path::PathBuf;
use std::sync::{Arc, Once};

use http::StatusCode;
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::debug;

use super::request::{read_request, translate, RawRequest, RequestContext};
use super::response::{to_transport, HttpResponse};
use super::worker::wait_for_shutdown;
use crate::core::{DispatchError, Request, Response};
use crate::logging::ErrorLogger;
use crate::middleware::MiddlewareChain;
use crate::routing::Router;

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
}

/// An application failure turned into a 500.
struct Failure {
    location: Option<(&'static str, u32)>,
    message: String,
}

impl Failure {
    fn diagnostic(&self) -> String {
        match self.location {
            Some((file, line)) => format!("[ERR] {}:{} >> {}", file, line, self.message),
            None => format!("[ERR] panic >> {}", self.message),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

thread_local! {
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a process panic hook that stays silent while a non-debug
/// dispatch is running on the current thread.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            if !panics_are_quiet() {
                original_hook(info);
            }
        }));
    });
}

#[inline]
fn panics_are_quiet() -> bool {
    QUIET_PANICS.with(Cell::get)
}

/// Run `f` with the panic hook silenced (or not) on this thread.
fn with_quiet_panics<R>(quiet: bool, f: impl FnOnce() -> R) -> R {
    let previous = QUIET_PANICS.with(|q| q.replace(quiet));
    let result = f();
    QUIET_PANICS.with(|q| q.set(previous));
    result
}

/// Runs the middleware chain and router for one request.
///
/// Every outcome becomes a [`Response`]: routing misses map to 404, any
/// other error or panic maps to 500. Nothing escapes to the worker.
pub struct Dispatcher {
    chain: MiddlewareChain,
    router: Arc<dyn Router>,
    debug: bool,
    logger: Option<Arc<dyn ErrorLogger>>,
}

impl Dispatcher {
    pub fn new(chain: MiddlewareChain, router: Arc<dyn Router>, debug: bool) -> Self {
        install_panic_hook();
        Self {
            chain,
            router,
            debug,
            logger: None,
        }
    }

    /// Forward failure diagnostics to `logger` as well.
    pub fn with_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    #[inline]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Dispatch an already-translated request.
    pub fn dispatch(&self, req: Request) -> Response {
        // Panic output on stderr is reserved for debug mode
        let outcome = with_quiet_panics(!self.debug, || {
            catch_unwind(AssertUnwindSafe(|| {
                self.chain.handle(req, self.router.as_ref())
            }))
        });

        let failure = match outcome {
            Ok(Ok(res)) => return res,
            Ok(Err(DispatchError::NotFound)) => return Response::not_found(),
            Ok(Err(DispatchError::Failed(e))) => Failure {
                location: Some((e.file(), e.line())),
                message: e.message().to_string(),
            },
            Err(payload) => Failure {
                location: None,
                message: panic_message(payload.as_ref()),
            },
        };

        self.report(&failure);
        Response::internal_error()
    }

    fn report(&self, failure: &Failure) {
        debug!(error = %failure.message, "request failed");

        if !self.debug && self.logger.is_none() {
            return;
        }

        let line = failure.diagnostic();
        if self.debug {
            eprintln!("{}", line);
        }
        if let Some(logger) = &self.logger {
            logger.error(&line);
        }
    }

    /// Translate, dispatch and serialize one exchange.
    ///
    /// Upload temp files the application did not move are removed afterwards.
    pub fn dispatch_raw(&self, raw: RawRequest) -> HttpResponse {
        let temp_files: Vec<PathBuf> = raw
            .files
            .values()
            .flatten()
            .filter(|f| f.is_ok())
            .map(|f| f.tmp_path.clone())
            .collect();

        let res = self.dispatch(translate(raw));

        for path in temp_files {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!(path = %path.display(), error = %e, "failed to remove upload temp file");
                }
            }
        }

        to_transport(res)
    }
}

/// Connection handler context, shared by every connection of one worker.
pub struct ConnectionContext {
    pub dispatcher: Arc<Dispatcher>,
    /// Local address of the listening socket.
    pub local_addr: SocketAddr,
    /// Directory for multipart temp files.
    pub upload_dir: PathBuf,
    pub max_upload_size: u64,
}

impl ConnectionContext {
    /// Serve HTTP/1.1 (keep-alive) or HTTP/2 on `stream` until the peer
    /// closes or shutdown is signalled. On shutdown the in-flight exchange
    /// completes and idle keep-alive connections are closed.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, remote_addr).await }
        });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder.http1().keep_alive(true);
        builder.http2().max_concurrent_streams(250);

        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(err) = result {
            let err_str = format!("{:?}", err);
            if !is_connection_error(&err_str) {
                debug!("Connection error: {:?}", err);
            }
        }
    }

    async fn handle_request(
        &self,
        req: hyper::Request<IncomingBody>,
        remote_addr: SocketAddr,
    ) -> Result<HttpResponse, Infallible> {
        let request_ctx = RequestContext {
            remote_addr,
            local_addr: self.local_addr,
            upload_dir: self.upload_dir.clone(),
            max_upload_size: self.max_upload_size,
        };

        let raw = match read_request(req, &request_ctx).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, remote = %remote_addr, "bad request");
                return Ok(to_transport(Response::empty(StatusCode::BAD_REQUEST)));
            }
        };

        // No await past this point: the exchange finishes before the
        // worker's event loop can start another one.
        Ok(self.dispatcher.dispatch_raw(raw))
    }
}
