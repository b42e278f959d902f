//! Multi-worker HTTP server runtime.
//!
//! [`ServerRuntime`] owns configuration, the route table, the middleware
//! chain and the job registry of one server. Its lifecycle is a small state
//! machine:
//!
//! ```text
//! Unconfigured --initialize--> Configured --start--> Running
//! ```
//!
//! Everything is registered before `start`; once running, the runtime is
//! frozen and each worker gets an immutable snapshot of it.
//!
//! # Example
//!
//! ```rust,ignore
//! use workhall::config::Settings;
//! use workhall::core::Response;
//! use workhall::server::ServerRuntime;
//!
//! let mut runtime = ServerRuntime::new();
//! runtime.initialize(&Settings::new().set("port", 8080))?;
//! runtime.add_route(http::Method::GET, "/", |_req| Ok(Response::ok("hello")))?;
//! runtime.start()?;
//! runtime.wait();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ServerRuntime                     │
//! │  ┌────────────┐  ┌────────────┐       ┌────────────┐ │
//! │  │ HTTP wkr 0 │  │ HTTP wkr 1 │  ...  │ job wkr(s) │ │
//! │  │ own loop   │  │ own loop   │       │ own loop   │ │
//! │  └─────┬──────┘  └─────┬──────┘       └─────┬──────┘ │
//! │        ▼               ▼                    ▼        │
//! │  ┌─────────────────────────────┐      ┌───────────┐  │
//! │  │ Dispatcher                  │      │  Timers   │  │
//! │  │ middleware -> router        │      └───────────┘  │
//! │  └─────────────────────────────┘                     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod connection;
mod error;
pub mod request;
pub mod response;
mod worker;

use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use http::Method;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub use connection::Dispatcher;
pub use error::RuntimeError;

use connection::ConnectionContext;
use request::MAX_UPLOAD_SIZE;
use worker::{create_listener, HttpWorker, JobWorker};

use crate::config::{ConfigError, ServerConfig, Settings};
use crate::core::{HandlerError, Request, Response};
use crate::jobs::{JobRegistry, WorkerJob};
use crate::logging::ErrorLogger;
use crate::middleware::{JsonBodyParser, Middleware, MiddlewareChain};
use crate::routing::{RouteTable, Router};
use crate::types::Hook;

/// Lifecycle state of a [`ServerRuntime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeState {
    Unconfigured,
    Configured,
    Running,
}

/// Result of [`ServerRuntime::initialize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// Settings were applied.
    Configured,
    /// A configuration already existed and was kept.
    AlreadyConfigured,
    /// The runtime is serving; nothing changed.
    AlreadyRunning,
}

/// Signals every worker of a runtime to stop.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop accepting, let in-flight exchanges finish, cancel job timers.
    pub fn trigger(&self) {
        if !*self.tx.borrow() {
            debug!("shutdown triggered");
        }
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// One server: configuration, routes, middleware, jobs and its workers.
pub struct ServerRuntime {
    state: RuntimeState,
    config: Option<ServerConfig>,
    routes: Arc<RouteTable>,
    router: Option<Arc<dyn Router>>,
    chain: MiddlewareChain,
    on_worker_start: Option<Hook>,
    jobs: JobRegistry,
    logger: Option<Arc<dyn ErrorLogger>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    threads: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Default for ServerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRuntime {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            state: RuntimeState::Unconfigured,
            config: None,
            routes: Arc::new(RouteTable::new()),
            router: None,
            chain: MiddlewareChain::new(),
            on_worker_start: None,
            jobs: JobRegistry::new(),
            logger: None,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            threads: Vec::new(),
            local_addr: None,
        }
    }

    /// Forward request failure diagnostics to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    #[inline]
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Effective configuration, once initialized.
    #[inline]
    pub fn config(&self) -> Option<&ServerConfig> {
        self.config.as_ref()
    }

    /// Validate `settings` and move to `Configured`.
    ///
    /// Every invalid field is reported in one [`ConfigError`]. Calling this
    /// again is not an error: the existing configuration is kept and the
    /// returned [`InitOutcome`] says why.
    pub fn initialize(&mut self, settings: &Settings) -> Result<InitOutcome, RuntimeError> {
        match self.state {
            RuntimeState::Configured => {
                warn!("server already configured, keeping existing configuration");
                return Ok(InitOutcome::AlreadyConfigured);
            }
            RuntimeState::Running => {
                warn!("server already running, configuration is frozen");
                return Ok(InitOutcome::AlreadyRunning);
            }
            RuntimeState::Unconfigured => {}
        }

        let config = settings.validate()?;
        debug!(
            addr = %config.addr(),
            workers = config.workers,
            debug = config.debug,
            "server configured"
        );

        self.config = Some(config);
        self.routes = Arc::new(RouteTable::new());
        self.chain = MiddlewareChain::new().add(JsonBodyParser::new());
        self.state = RuntimeState::Configured;
        Ok(InitOutcome::Configured)
    }

    fn ensure_configured(&self) -> Result<(), RuntimeError> {
        match self.state {
            RuntimeState::Unconfigured => Err(RuntimeError::NotConfigured),
            RuntimeState::Running => Err(RuntimeError::AlreadyRunning),
            RuntimeState::Configured => Ok(()),
        }
    }

    /// Hook run once on every HTTP worker before it accepts connections.
    pub fn on_worker_start<F>(&mut self, hook: F) -> Result<(), RuntimeError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.state == RuntimeState::Running {
            return Err(RuntimeError::AlreadyRunning);
        }
        self.on_worker_start = Some(Arc::new(hook));
        Ok(())
    }

    /// Register a handler on the built-in route table.
    pub fn add_route<F>(
        &mut self,
        method: Method,
        path: impl Into<String>,
        handler: F,
    ) -> Result<(), RuntimeError>
    where
        F: Fn(Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
    {
        self.ensure_configured()?;
        Arc::make_mut(&mut self.routes).add(method, path, handler);
        Ok(())
    }

    /// Copy every route of `table` under `prefix`.
    pub fn mount(&mut self, prefix: &str, table: &RouteTable) -> Result<(), RuntimeError> {
        self.ensure_configured()?;
        Arc::make_mut(&mut self.routes).mount(prefix, table);
        Ok(())
    }

    /// Replace the built-in route table with another routing collaborator.
    pub fn set_router<R>(&mut self, router: R) -> Result<(), RuntimeError>
    where
        R: Router + 'static,
    {
        self.ensure_configured()?;
        self.router = Some(Arc::new(router));
        Ok(())
    }

    /// Append a middleware. Earlier middleware wraps later middleware.
    pub fn add_middleware<M>(&mut self, middleware: M) -> Result<(), RuntimeError>
    where
        M: Middleware + 'static,
    {
        self.ensure_configured()?;
        self.chain.push(Arc::new(middleware));
        Ok(())
    }

    /// Register a periodic job, started with the runtime.
    pub fn add_job(&mut self, job: WorkerJob) -> Result<(), RuntimeError> {
        if self.state == RuntimeState::Running {
            return Err(RuntimeError::AlreadyRunning);
        }
        self.jobs.add(job)?;
        Ok(())
    }

    #[inline]
    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    fn dispatcher(&self, config: &ServerConfig) -> Dispatcher {
        let router: Arc<dyn Router> = match &self.router {
            Some(router) => Arc::clone(router),
            None => Arc::clone(&self.routes) as Arc<dyn Router>,
        };

        let dispatcher = Dispatcher::new(self.chain.clone(), router, config.debug);
        match &self.logger {
            Some(logger) => dispatcher.with_logger(Arc::clone(logger)),
            None => dispatcher,
        }
    }

    /// Run `req` through middleware and router in the calling thread.
    ///
    /// Routing misses and failures come back as 404 and 500 responses, the
    /// same as over the wire.
    pub fn handle(&self, req: Request) -> Result<Response, RuntimeError> {
        let config = self.config.as_ref().ok_or(RuntimeError::NotConfigured)?;
        Ok(self.dispatcher(config).dispatch(req))
    }

    /// Bind the listener and spawn HTTP and job workers.
    ///
    /// Returns once every HTTP worker has run its startup hook and is
    /// accepting. If any of them fails, everything is shut down again.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        self.ensure_configured()?;
        let config = self.config.clone().ok_or(RuntimeError::NotConfigured)?;

        std::fs::create_dir_all(&config.upload_dir).map_err(|error| ConfigError::Io {
            path: config.upload_dir.display().to_string(),
            error,
        })?;

        let addr = config.addr();
        let listener =
            create_listener(addr).map_err(|source| RuntimeError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| RuntimeError::Bind { addr, source })?;

        let ctx = Arc::new(ConnectionContext {
            dispatcher: Arc::new(self.dispatcher(&config)),
            local_addr,
            upload_dir: config.upload_dir.clone(),
            max_upload_size: MAX_UPLOAD_SIZE,
        });

        if let Err(e) = self.spawn_workers(&config, &listener, &ctx) {
            self.shutdown();
            return Err(e);
        }

        info!(
            addr = %local_addr,
            workers = config.workers,
            jobs = self.jobs.len(),
            job_workers = self.jobs.worker_count(),
            "{} listening",
            crate::SERVER_SOFTWARE
        );

        self.local_addr = Some(local_addr);
        self.state = RuntimeState::Running;
        Ok(())
    }

    fn spawn_workers(
        &mut self,
        config: &ServerConfig,
        listener: &std::net::TcpListener,
        ctx: &Arc<ConnectionContext>,
    ) -> Result<(), RuntimeError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        for id in 0..config.workers {
            let handle = HttpWorker {
                id,
                listener: listener.try_clone().map_err(RuntimeError::Spawn)?,
                ctx: Arc::clone(ctx),
                on_start: self.on_worker_start.clone(),
                shutdown_rx: self.shutdown_rx.clone(),
                ready: ready_tx.clone(),
            }
            .spawn()
            .map_err(RuntimeError::Spawn)?;
            self.threads.push(handle);
        }
        drop(ready_tx);

        // A worker that dies without reporting drops its sender
        let ready = ready_rx.iter().take(config.workers).filter(|ok| *ok).count();
        if ready < config.workers {
            return Err(RuntimeError::WorkerStartup {
                failed: config.workers - ready,
                workers: config.workers,
            });
        }

        for job in self.jobs.iter() {
            for index in 0..job.workers() {
                let handle = JobWorker {
                    job: Arc::clone(job),
                    index,
                    shutdown_rx: self.shutdown_rx.clone(),
                }
                .spawn()
                .map_err(RuntimeError::Spawn)?;
                self.threads.push(handle);
            }
        }

        Ok(())
    }

    /// Address actually bound, once running.
    #[inline]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Signal shutdown and wait for every worker to exit.
    pub fn shutdown(&mut self) {
        self.shutdown_handle().trigger();
        self.wait();
    }

    /// Block until every worker thread has exited.
    ///
    /// The runtime stays frozen afterwards; it cannot be started again.
    pub fn wait(&mut self) {
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for ServerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRuntime")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("routes", &self.routes.len())
            .field("middleware", &self.chain.names())
            .field("jobs", &self.jobs.len())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// Start several runtimes and block until all of them stop.
///
/// If any runtime fails to start, the ones already started are shut down
/// and the error is returned.
pub fn run_all(runtimes: &mut [ServerRuntime]) -> Result<(), RuntimeError> {
    for i in 0..runtimes.len() {
        if let Err(e) = runtimes[i].start() {
            error!(error = %e, "failed to start server");
            for started in &mut runtimes[..i] {
                started.shutdown();
            }
            return Err(e);
        }
    }

    for runtime in runtimes.iter_mut() {
        runtime.wait();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DispatchError;
    use http::StatusCode;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn local_settings(port: u16) -> Settings {
        Settings::new()
            .set("host", "127.0.0.1")
            .set("port", port)
            .set("workers", 1)
    }

    fn get(path: &str) -> Request {
        Request::new(Method::GET, path.parse().unwrap())
    }

    #[test]
    fn test_initialize_twice_keeps_first_config() {
        let mut runtime = ServerRuntime::new();
        assert_eq!(runtime.state(), RuntimeState::Unconfigured);

        let first = runtime.initialize(&local_settings(9001)).unwrap();
        assert_eq!(first, InitOutcome::Configured);

        let second = runtime.initialize(&local_settings(9002)).unwrap();
        assert_eq!(second, InitOutcome::AlreadyConfigured);
        assert_eq!(runtime.config().unwrap().port, 9001);
        assert_eq!(runtime.state(), RuntimeState::Configured);
    }

    #[test]
    fn test_initialize_reports_every_invalid_field() {
        let mut runtime = ServerRuntime::new();
        let settings = Settings::new()
            .set("host", "999.999.999.999")
            .set("port", -1);

        match runtime.initialize(&settings) {
            Err(RuntimeError::Config(e)) => assert_eq!(e.fields(), ["host", "port"]),
            other => panic!("expected config error, got {:?}", other),
        }
        assert_eq!(runtime.state(), RuntimeState::Unconfigured);

        // A failed attempt does not block a corrected one
        assert_eq!(
            runtime.initialize(&local_settings(9003)).unwrap(),
            InitOutcome::Configured
        );
    }

    #[test]
    fn test_facade_requires_initialize() {
        let mut runtime = ServerRuntime::new();

        assert!(matches!(
            runtime.add_route(Method::GET, "/", |_req| Ok(Response::ok(""))),
            Err(RuntimeError::NotConfigured)
        ));
        assert!(matches!(
            runtime.add_middleware(JsonBodyParser::new()),
            Err(RuntimeError::NotConfigured)
        ));
        assert!(matches!(runtime.handle(get("/")), Err(RuntimeError::NotConfigured)));
        assert!(matches!(runtime.start(), Err(RuntimeError::NotConfigured)));
    }

    #[test]
    fn test_handle_maps_outcomes() {
        let mut runtime = ServerRuntime::new();
        runtime.initialize(&local_settings(9004)).unwrap();
        runtime
            .add_route(Method::GET, "/ok", |_req| Ok(Response::ok("ok")))
            .unwrap();
        runtime
            .add_route(Method::GET, "/boom", |_req| Err(HandlerError::new("boom")))
            .unwrap();

        let res = runtime.handle(get("/ok")).unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = runtime.handle(get("/missing")).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.body().is_empty());

        let res = runtime.handle(get("/boom")).unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_json_body_parser_installed_by_initialize() {
        let mut runtime = ServerRuntime::new();
        runtime.initialize(&local_settings(9005)).unwrap();
        runtime
            .add_route(Method::POST, "/echo", |req: Request| {
                let body = req.parsed_body().cloned().unwrap_or_default();
                Ok(Response::json(&body))
            })
            .unwrap();

        let req = Request::new(Method::POST, "/echo".parse().unwrap())
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"x":1}"#);
        let res = runtime.handle(req).unwrap();
        assert_eq!(res.body().as_ref(), br#"{"x":1}"#);
    }

    #[test]
    fn test_set_router_replaces_route_table() {
        let mut runtime = ServerRuntime::new();
        runtime.initialize(&local_settings(9006)).unwrap();
        runtime
            .set_router(|_req: Request| -> Result<Response, DispatchError> {
                Ok(Response::ok("custom"))
            })
            .unwrap();

        let res = runtime.handle(get("/anything")).unwrap();
        assert_eq!(res.body().as_ref(), b"custom");
    }

    #[test]
    fn test_start_serves_and_freezes() {
        let mut runtime = ServerRuntime::new();
        runtime.initialize(&local_settings(free_port())).unwrap();
        runtime
            .add_route(Method::GET, "/ping", |_req| Ok(Response::ok("pong")))
            .unwrap();

        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        runtime
            .on_worker_start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        runtime.start().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Running);
        let addr = runtime.local_addr().unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert!(reply.starts_with("HTTP/1.1 200"));
        assert!(reply.ends_with("pong"));
        assert_eq!(started.load(Ordering::SeqCst), 1);

        assert!(matches!(
            runtime.add_route(Method::GET, "/late", |_req| Ok(Response::ok(""))),
            Err(RuntimeError::AlreadyRunning)
        ));
        assert!(matches!(
            runtime.add_job(WorkerJob::new(Duration::from_secs(1), || {})),
            Err(RuntimeError::AlreadyRunning)
        ));
        assert_eq!(
            runtime.initialize(&local_settings(1)).unwrap(),
            InitOutcome::AlreadyRunning
        );
        assert!(matches!(runtime.start(), Err(RuntimeError::AlreadyRunning)));

        runtime.shutdown();
        assert!(runtime.shutdown_handle().is_triggered());
    }

    #[test]
    fn test_run_all_stops_started_runtimes_on_failure() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let mut good = ServerRuntime::new();
        good.initialize(&local_settings(free_port())).unwrap();

        let mut bad = ServerRuntime::new();
        bad.initialize(&local_settings(port)).unwrap();

        let mut runtimes = vec![good, bad];
        let err = run_all(&mut runtimes).unwrap_err();
        assert!(matches!(err, RuntimeError::Bind { .. }));
        assert!(runtimes[0].shutdown_handle().is_triggered());
    }
}
