//! Basic HTTP tests: routing, query strings, JSON bodies, error mapping.

use crate::helpers::*;
use http::Method;
use reqwest::StatusCode;
use std::sync::Arc;
use workhall::core::{HandlerError, Request, Response};
use workhall::middleware::from_fn;
use workhall::types::QueryValue;

fn query_json(req: &Request) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, value) in req.query_params() {
        let value = match value {
            QueryValue::Single(s) => serde_json::json!(s),
            QueryValue::List(items) => serde_json::json!(items),
        };
        map.insert(key.clone(), value);
    }
    serde_json::Value::Object(map)
}

fn demo_server() -> TestServer {
    TestServer::start(|rt| {
        rt.add_route(Method::GET, "/hello", |_req| Ok(Response::ok("hello")))
            .unwrap();
        rt.add_route(Method::GET, "/query", |req: Request| {
            Ok(Response::json(&query_json(&req)))
        })
        .unwrap();
        rt.add_route(Method::POST, "/json", |req: Request| {
            let parsed = req.parsed_body().cloned().unwrap_or_default();
            Ok(Response::json(&serde_json::json!({ "parsed": parsed })))
        })
        .unwrap();
        rt.add_route(Method::GET, "/fail", |_req| {
            Err(HandlerError::new("backend unavailable"))
        })
        .unwrap();
        rt.add_route(Method::GET, "/panic", |_req| panic!("handler exploded"))
            .unwrap();
        rt.add_route(Method::GET, "/cookies", |req: Request| {
            let session = req.cookie_params().get("session").cloned().unwrap_or_default();
            Ok(Response::ok(session))
        })
        .unwrap();
        rt.add_route(Method::GET, "/typed", |_req| {
            Ok(Response::ok("<p>hi</p>")
                .with_header("Content-Type", "text/html")
                .with_header("Server", "custom"))
        })
        .unwrap();
        rt.add_route(Method::GET, "/multi", |_req| {
            Ok(Response::ok("")
                .with_added_header("Set-Cookie", "a=1")
                .with_added_header("Set-Cookie", "b=2"))
        })
        .unwrap();
    })
}

#[tokio::test]
async fn test_get_with_default_headers() {
    let server = demo_server();
    let resp = server.get("/hello").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "server", workhall::SERVER_SOFTWARE);
    assert_header(&resp, "content-type", "text/plain; charset=utf-8");
    assert_body(resp, "hello").await;
}

#[tokio::test]
async fn test_explicit_headers_are_not_overwritten() {
    let server = demo_server();
    let resp = server.get("/typed").await;

    assert_header(&resp, "server", "custom");
    assert_header(&resp, "content-type", "text/html");
}

#[tokio::test]
async fn test_multi_value_headers_are_repeated() {
    let server = demo_server();
    let resp = server.get("/multi").await;

    let cookies: Vec<&str> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn test_query_params() {
    let server = demo_server();

    let resp = server.get("/query?a=1&b=2").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "a": "1", "b": "2" }));

    let resp = server.get("/query?tag[]=x&tag[]=y&name=J+Doe").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "tag": ["x", "y"], "name": "J Doe" })
    );

    let resp = server.get("/query").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({}));
}

#[tokio::test]
async fn test_malformed_query_degrades_to_empty() {
    let server = demo_server();
    let resp = server.get("/query?bad=%FF").await;

    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({}));
}

#[tokio::test]
async fn test_json_body_is_parsed() {
    let server = demo_server();
    let resp = server.post_json("/json", &serde_json::json!({ "x": 1 })).await;

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "parsed": { "x": 1 } }));
}

#[tokio::test]
async fn test_json_body_ignored_for_other_content_types() {
    let server = demo_server();

    let resp = server.post_raw("/json", "text/plain", r#"{"x":1}"#).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "parsed": null }));

    let resp = server.post_raw("/json", "application/json", "{not json").await;
    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "parsed": null }));
}

#[tokio::test]
async fn test_not_found_is_empty_404() {
    let server = demo_server();
    let resp = server.get("/path/to/nowhere").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_header(&resp, "content-type", "text/plain; charset=utf-8");
    assert_body(resp, "").await;
}

#[tokio::test]
async fn test_handler_error_is_empty_500() {
    let server = demo_server();
    let resp = server.get("/fail").await;

    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    assert_body(resp, "").await;
}

#[tokio::test]
async fn test_worker_survives_panic() {
    let server = demo_server();

    // Single worker: both requests land on the same event loop
    let resp = server.get("/panic").await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    assert_body(resp, "").await;

    let resp = server.get("/hello").await;
    assert_status(&resp, StatusCode::OK);
    assert_body(resp, "hello").await;
}

#[tokio::test]
async fn test_cookies() {
    let server = demo_server();
    let resp = server
        .get_with_headers("/cookies", &[("cookie", "theme=dark; session=abc123")])
        .await;

    assert_body(resp, "abc123").await;
}

#[tokio::test]
async fn test_head_falls_back_to_get() {
    let server = demo_server();
    let resp = server
        .client
        .head(server.url("/hello"))
        .send()
        .await
        .expect("HEAD request failed");

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "server", workhall::SERVER_SOFTWARE);
}

#[tokio::test]
async fn test_middleware_order_and_short_circuit() {
    let server = TestServer::start(|rt| {
        rt.add_middleware(from_fn("tag", |req: Request, next| {
            let res = next.run(req.with_header("X-Tag", "outer"))?;
            Ok(res.with_header("X-Outer", "1"))
        }))
        .unwrap();
        rt.add_middleware(from_fn("guard", |req: Request, next| {
            if req.header("authorization").is_none() {
                return Ok(Response::new(401)?);
            }
            next.run(req)
        }))
        .unwrap();
        rt.add_route(Method::GET, "/tag", |req: Request| {
            Ok(Response::ok(req.header("x-tag").unwrap_or("").to_string()))
        })
        .unwrap();
    });

    let resp = server.get("/tag").await;
    assert_status(&resp, StatusCode::UNAUTHORIZED);
    assert_header(&resp, "x-outer", "1");

    let resp = server
        .get_with_headers("/tag", &[("authorization", "Bearer t")])
        .await;
    assert_status(&resp, StatusCode::OK);
    assert_body(resp, "outer").await;
}

#[tokio::test]
async fn test_logger_receives_failures() {
    use std::sync::Mutex;
    use workhall::logging::ErrorLogger;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl ErrorLogger for Capture {
        fn error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    let capture = Arc::new(Capture::default());
    let runtime = workhall::ServerRuntime::new().with_logger(capture.clone());
    let server = TestServer::start_with(runtime, |rt| {
        rt.add_route(Method::GET, "/fail", |_req| Err(HandlerError::new("db down")))
            .unwrap();
    });

    server.get("/fail").await;
    server.get("/missing").await;

    let lines = capture.0.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[ERR] "));
    assert!(lines[0].ends_with(">> db down"));
}
