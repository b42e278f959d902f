//! Periodic job tests.

use crate::helpers::*;
use http::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workhall::core::Response;
use workhall::jobs::{self, WorkerJob};

#[tokio::test]
async fn test_job_fires_without_traffic() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    let _server = TestServer::start(move |rt| {
        rt.add_job(
            WorkerJob::new(Duration::from_secs(1), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .with_name("tick"),
        )
        .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(fired.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_job_workers_run_hooks_and_see_context() {
    let hooks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let hook_counter = Arc::clone(&hooks);
    let seen_inner = Arc::clone(&seen);
    let _server = TestServer::start(move |rt| {
        rt.add_job(
            WorkerJob::new(Duration::from_millis(100), move || {
                if let Some(ctx) = jobs::current_worker() {
                    seen_inner
                        .lock()
                        .unwrap()
                        .push((ctx.job_name, ctx.worker_index, ctx.timer_ids.len()));
                }
            })
            .with_name("sweep")
            .with_workers(2)
            .with_on_start(move || {
                hook_counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(hooks.load(Ordering::SeqCst), 2);

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|(_, index, _)| *index == 0));
    assert!(seen.iter().any(|(_, index, _)| *index == 1));
    assert!(seen
        .iter()
        .all(|(name, _, timers)| name == "sweep" && *timers == 1));
}

#[tokio::test]
async fn test_panicking_job_keeps_firing_and_http_unaffected() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    let server = TestServer::start(move |rt| {
        rt.add_job(WorkerJob::new(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("job failed");
        }))
        .unwrap();
        rt.add_route(Method::GET, "/", |_req| Ok(Response::ok("up")))
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(fired.load(Ordering::SeqCst) >= 2);

    let resp = server.get("/").await;
    assert_body(resp, "up").await;
}
