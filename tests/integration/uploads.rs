//! Multipart upload tests.

use crate::helpers::*;
use http::Method;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use workhall::core::{Request, Response};

fn upload_server() -> TestServer {
    TestServer::start(|rt| {
        rt.add_route(Method::POST, "/upload", |req: Request| {
            let files: Vec<serde_json::Value> = req
                .uploaded_files()
                .get("doc")
                .into_iter()
                .flatten()
                .map(|f| {
                    serde_json::json!({
                        "name": f.client_filename,
                        "type": f.client_media_type,
                        "size": f.size,
                        "error": f.error,
                        "exists": f.tmp_path.exists(),
                        "tmp": f.tmp_path.display().to_string(),
                    })
                })
                .collect();
            let fields: serde_json::Map<String, serde_json::Value> = req
                .form_params()
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::json!(v)))
                .collect();

            Ok(Response::json(&serde_json::json!({ "files": files, "fields": fields })))
        })
        .unwrap();
    })
}

#[tokio::test]
async fn test_multipart_upload() {
    let server = upload_server();

    let form = Form::new().text("title", "report").part(
        "doc",
        Part::bytes(b"hello upload".to_vec())
            .file_name("hello.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let resp = server
        .client
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .expect("upload failed");

    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(body["fields"]["title"], "report");
    let file = &body["files"][0];
    assert_eq!(file["name"], "hello.txt");
    assert_eq!(file["type"], "text/plain");
    assert_eq!(file["size"], 12);
    assert_eq!(file["error"], 0);
    assert_eq!(file["exists"], true);

    // The temp file lives in the upload dir and is gone after the exchange
    let tmp = std::path::PathBuf::from(file["tmp"].as_str().unwrap());
    assert!(tmp.starts_with(server.upload_dir.path()));
    assert!(!tmp.exists());
}

#[tokio::test]
async fn test_multipart_content_type_is_case_insensitive() {
    let server = upload_server();

    let body = "--XB\r\n\
                Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                mixed case\r\n\
                --XB--\r\n";
    let resp = server
        .post_raw("/upload", "Multipart/Form-Data; boundary=XB", body)
        .await;

    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["fields"]["title"], "mixed case");
}
