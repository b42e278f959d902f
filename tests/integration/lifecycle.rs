//! Runtime lifecycle tests: worker hooks, shutdown, multi-runtime startup.

use crate::helpers::*;
use http::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use workhall::core::Response;
use workhall::server::{InitOutcome, RuntimeState};
use workhall::{run_all, RuntimeError, ServerRuntime};

#[tokio::test]
async fn test_worker_start_hook_runs_per_worker() {
    let started = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&started);
    let dir = tempfile::tempdir().unwrap();

    let mut runtime = ServerRuntime::new();
    runtime
        .initialize(&local_settings(free_port(), dir.path()).set("workers", 3))
        .unwrap();
    runtime
        .on_worker_start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    runtime.start().unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let expected = if cfg!(unix) { 3 } else { 1 };
    assert_eq!(started.load(Ordering::SeqCst), expected);

    runtime.shutdown();
}

#[tokio::test]
async fn test_failing_worker_hook_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();

    let mut runtime = ServerRuntime::new();
    runtime
        .initialize(&local_settings(port, dir.path()).set("workers", 2))
        .unwrap();
    runtime
        .on_worker_start(|| panic!("database unreachable"))
        .unwrap();

    let err = runtime.start().unwrap_err();
    assert!(matches!(err, RuntimeError::WorkerStartup { failed, .. } if failed >= 1));
    assert_ne!(runtime.state(), RuntimeState::Running);
    assert!(runtime.shutdown_handle().is_triggered());

    // Nothing is left holding the port
    std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
}

#[tokio::test]
async fn test_reinitialize_while_running_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();

    let mut runtime = ServerRuntime::new();
    runtime.initialize(&local_settings(port, dir.path())).unwrap();
    runtime
        .add_route(Method::GET, "/", |_req| Ok(Response::ok("ok")))
        .unwrap();
    runtime.start().unwrap();
    assert_eq!(runtime.state(), RuntimeState::Running);

    let outcome = runtime
        .initialize(&local_settings(free_port(), dir.path()).set("debug", true))
        .unwrap();
    assert_eq!(outcome, InitOutcome::AlreadyRunning);
    assert_eq!(runtime.config().unwrap().port, port);
    assert!(!runtime.config().unwrap().debug);

    let resp = reqwest::get(format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "ok");

    runtime.shutdown();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let dir = tempfile::tempdir().unwrap();
    let mut runtime = ServerRuntime::new();
    runtime
        .initialize(&local_settings(free_port(), dir.path()))
        .unwrap();
    runtime
        .add_route(Method::GET, "/", |_req| Ok(Response::ok("ok")))
        .unwrap();
    runtime.start().unwrap();
    let addr = runtime.local_addr().unwrap();

    let handle = runtime.shutdown_handle();
    let waiter = std::thread::spawn(move || {
        runtime.wait();
    });

    let client = reqwest::Client::new();
    let resp = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "ok");
    drop(client);

    handle.trigger();
    waiter.join().unwrap();

    let refused = reqwest::Client::new()
        .get(format!("http://{}/", addr))
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_run_all_reports_bind_failure() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = occupied.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();

    let mut first = ServerRuntime::new();
    first
        .initialize(&local_settings(free_port(), dir.path()))
        .unwrap();
    let mut second = ServerRuntime::new();
    second.initialize(&local_settings(taken, dir.path())).unwrap();

    let mut runtimes = [first, second];
    let err = run_all(&mut runtimes).unwrap_err();

    assert!(matches!(err, RuntimeError::Bind { .. }));
    assert!(runtimes[0].shutdown_handle().is_triggered());
}
