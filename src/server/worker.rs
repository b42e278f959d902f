//! Worker threads.
//!
//! Every worker is an OS thread driving its own single-threaded tokio
//! runtime. HTTP workers accept on a clone of the shared listening socket;
//! job workers only run timers. Workers share nothing mutable.

use std::io;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::connection::ConnectionContext;
use crate::jobs::{self, JobWorkerContext, Timers, WorkerJob};
use crate::types::Hook;

/// How long a stopping worker waits for open connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind the listening socket shared by all HTTP workers.
pub(crate) fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

/// Resolve once shutdown has been signalled or the sender is gone.
pub(crate) async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Run a startup hook, containing panics. Returns false if it panicked.
pub(crate) fn run_startup_hook(hook: &Hook, worker: &str) -> bool {
    match catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(()) => true,
        Err(_) => {
            error!(worker = worker, "startup hook panicked, worker stopping");
            false
        }
    }
}

fn build_runtime(worker: &str) -> Option<tokio::runtime::Runtime> {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => Some(rt),
        Err(e) => {
            error!(worker = worker, error = %e, "failed to build worker runtime");
            None
        }
    }
}

/// Everything an HTTP worker needs, moved into its thread.
pub(crate) struct HttpWorker {
    pub id: usize,
    pub listener: std::net::TcpListener,
    pub ctx: Arc<ConnectionContext>,
    pub on_start: Option<Hook>,
    pub shutdown_rx: watch::Receiver<bool>,
    /// Receives `true` once the worker is accepting, `false` if it gave up.
    pub ready: mpsc::Sender<bool>,
}

impl HttpWorker {
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("workhall-http-{}", self.id))
            .spawn(move || self.run())
    }

    fn run(self) {
        let label = format!("http-{}", self.id);
        let Some(rt) = build_runtime(&label) else {
            let _ = self.ready.send(false);
            return;
        };

        if let Some(hook) = &self.on_start {
            if !run_startup_hook(hook, &label) {
                let _ = self.ready.send(false);
                return;
            }
        }

        rt.block_on(self.accept_loop(label));
    }

    async fn accept_loop(self, label: String) {
        let HttpWorker {
            listener,
            ctx,
            mut shutdown_rx,
            ready,
            ..
        } = self;

        let listener = match TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                error!(worker = %label, error = %e, "failed to register listener");
                let _ = ready.send(false);
                return;
            }
        };
        let _ = ready.send(true);

        debug!(worker = %label, "worker started");
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!(worker = %label, error = %e, "accept error");
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);
                    let ctx = Arc::clone(&ctx);
                    let conn_shutdown = shutdown_rx.clone();
                    connections.spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    debug!(worker = %label, "received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        drop(listener);
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            debug!(worker = %label, open = connections.len(), "drain timeout, dropping connections");
        }
        debug!(worker = %label, "worker stopped");
    }
}

/// One worker of a job's group.
pub(crate) struct JobWorker {
    pub job: Arc<WorkerJob>,
    pub index: usize,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl JobWorker {
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("workhall-job-{}-{}", self.job.name(), self.index))
            .spawn(move || self.run())
    }

    fn run(self) {
        let label = format!("{} [job] {}#{}", crate::SERVER_SOFTWARE, self.job.name(), self.index);
        let Some(rt) = build_runtime(&label) else {
            return;
        };

        if let Some(hook) = self.job.on_start() {
            if !run_startup_hook(hook, &label) {
                return;
            }
        }

        let JobWorker {
            job,
            index,
            mut shutdown_rx,
        } = self;

        rt.block_on(async move {
            let mut timers = Timers::new(job.name());
            timers.add(job.interval(), Arc::clone(job.task()));

            jobs::set_current_worker(Some(JobWorkerContext {
                job_name: job.name().to_string(),
                worker_index: index,
                timer_ids: timers.ids(),
            }));
            info!(worker = %label, interval_ms = job.interval().as_millis() as u64, "job worker started");

            wait_for_shutdown(&mut shutdown_rx).await;

            timers.cancel_all();
            jobs::set_current_worker(None);
            debug!(worker = %label, "job worker stopped");
        });
    }
}
