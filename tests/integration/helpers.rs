//! Test helpers and utilities

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tempfile::TempDir;
use workhall::config::Settings;
use workhall::ServerRuntime;

/// Pick a port that is free right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind probe socket")
        .local_addr()
        .expect("Failed to read probe address")
        .port()
}

/// Loopback settings for a single-worker runtime.
pub fn local_settings(port: u16, upload_dir: &std::path::Path) -> Settings {
    Settings::new()
        .set("host", "127.0.0.1")
        .set("port", port)
        .set("workers", 1)
        .set("upload_dir", upload_dir.display().to_string())
}

/// In-process server, shut down on drop.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub upload_dir: TempDir,
    runtime: ServerRuntime,
}

#[allow(dead_code)]
impl TestServer {
    /// Initialize a runtime on a free loopback port, let `configure` register
    /// routes, middleware and jobs, then start it.
    pub fn start<F>(configure: F) -> Self
    where
        F: FnOnce(&mut ServerRuntime),
    {
        Self::start_with(ServerRuntime::new(), configure)
    }

    pub fn start_with<F>(mut runtime: ServerRuntime, configure: F) -> Self
    where
        F: FnOnce(&mut ServerRuntime),
    {
        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
        runtime
            .initialize(&local_settings(free_port(), upload_dir.path()))
            .expect("Failed to initialize runtime");
        configure(&mut runtime);
        runtime.start().expect("Failed to start runtime");

        let addr = runtime.local_addr().expect("Runtime has no local address");
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            upload_dir,
            runtime,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Make a POST request with a raw body and content type
    pub async fn post_raw(&self, path: &str, content_type: &str, body: &'static str) -> Response {
        self.client
            .post(self.url(path))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a POST request with JSON body
    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, json: &T) -> Response {
        self.client
            .post(self.url(path))
            .json(json)
            .send()
            .await
            .expect("POST request failed")
    }

    pub fn runtime(&self) -> &ServerRuntime {
        &self.runtime
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.runtime.shutdown();
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .expect("Header value is not valid UTF-8");
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Assert that the body is exactly `expected`
pub async fn assert_body(response: Response, expected: &str) {
    let body = response.text().await.expect("Failed to read body");
    assert_eq!(body, expected);
}
