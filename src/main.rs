use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tracing::{error, info};

use workhall::config::Config;
use workhall::core::{HandlerError, Request, Response};
use workhall::logging::{self, TracingErrorLogger};
use workhall::middleware::AccessLogMiddleware;
use workhall::{ServerRuntime, WorkerJob};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging);

    info!("Starting {}...", workhall::SERVER_SOFTWARE);
    config.log_summary();

    let mut runtime = ServerRuntime::new().with_logger(Arc::new(TracingErrorLogger));
    runtime.initialize(&config.settings)?;

    if config.access_log {
        runtime.add_middleware(AccessLogMiddleware::new())?;
    }

    let server_config = config.server.to_json();
    runtime.add_route(Method::GET, "/", |_req| Ok(Response::ok("Hello from workhall\n")))?;
    runtime.add_route(Method::GET, "/config", move |_req| {
        Ok(Response::json(&server_config))
    })?;
    runtime.add_route(Method::POST, "/echo", echo)?;

    runtime.add_job(
        WorkerJob::new(Duration::from_secs(60), || info!("heartbeat")).with_name("heartbeat"),
    )?;

    runtime.start()?;

    // Wait for Ctrl-C on a small dedicated event loop, then stop workers
    let shutdown = runtime.shutdown_handle();
    let signal_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    signal_rt.block_on(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    shutdown.trigger();
    runtime.wait();
    info!("Server stopped");
    Ok(())
}

/// Echo the parsed JSON body, or the raw body when there is none.
fn echo(req: Request) -> Result<Response, HandlerError> {
    match req.parsed_body() {
        Some(value) => Ok(Response::json(value)),
        None => Ok(Response::ok(req.body().clone())),
    }
}
