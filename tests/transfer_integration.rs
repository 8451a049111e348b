//! Integration tests for HTTP transfers.
//!
//! These tests send real multipart requests to a mock HTTP server.

mod support;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uploader_core::upload::TransferOutcome;
use uploader_core::{
    Capabilities, HttpTransport, TransferEvent, TransferExecutor, TransferOptions, UploadFile,
    UploadStatus,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

fn executor(options: TransferOptions) -> TransferExecutor {
    TransferExecutor::new(
        options,
        Arc::new(HttpTransport::new().unwrap()),
        Capabilities::detect(),
    )
}

/// Runs one transfer to completion and returns every event it reported.
async fn run_transfer(executor: &TransferExecutor, file: &UploadFile) -> Vec<TransferEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = executor.transfer(file, Arc::new(tx));
    tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("transfer did not finish");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn outcome(events: &[TransferEvent]) -> TransferOutcome {
    match events.last() {
        Some(TransferEvent::Finished(outcome)) => outcome.clone(),
        other => panic!("expected a finished event last, got {other:?}"),
    }
}

async fn mount_ok(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":42}"))
        .mount(mock_server)
        .await;
}

// ==================== Request Shape Tests ====================

#[tokio::test]
async fn test_multipart_body_has_file_first_then_params() {
    let mock_server = require_mock_server!();
    mount_ok(&mock_server).await;

    let options = TransferOptions::builder(format!("{}/upload", mock_server.uri()))
        .param("folder", "reports")
        .param("owner", "ops")
        .build()
        .unwrap();
    let file = UploadFile::from_bytes("notes.txt", b"quarterly numbers".to_vec());
    let events = run_transfer(&executor(options), &file).await;

    let result = outcome(&events);
    assert_eq!(result.status, UploadStatus::Uploaded);
    assert_eq!(result.response_code, 200);
    assert_eq!(result.response_text, "{\"id\":42}");
    assert_eq!(events.first(), Some(&TransferEvent::Started));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let content_type = requests[0].headers.get("content-type").unwrap();
    assert!(
        content_type
            .to_str()
            .unwrap()
            .starts_with("multipart/form-data")
    );

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"notes.txt\""), "{body}");
    assert!(body.contains("quarterly numbers"));
    let file_at = body.find("name=\"file\"").unwrap();
    let folder_at = body.find("name=\"folder\"").unwrap();
    let owner_at = body.find("name=\"owner\"").unwrap();
    assert!(file_at < folder_at && folder_at < owner_at);
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let mock_server = require_mock_server!();
    Mock::given(method("POST"))
        .and(header("accept", "application/json"))
        .and(header("cache-control", "no-cache"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = TransferOptions::builder(mock_server.uri()).build().unwrap();
    let file = UploadFile::from_bytes("a.bin", vec![1, 2, 3]);
    let result = outcome(&run_transfer(&executor(options), &file).await);

    assert_eq!(result.status, UploadStatus::Uploaded);
}

#[tokio::test]
async fn test_custom_header_overrides_default_and_method_is_used() {
    let mock_server = require_mock_server!();
    Mock::given(method("PUT"))
        .and(path("/files"))
        .and(header("accept", "text/plain"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = TransferOptions::builder(format!("{}/files", mock_server.uri()))
        .method("put")
        .header("Accept", "text/plain")
        .header("Authorization", "Bearer t0ken")
        .build()
        .unwrap();
    let file = UploadFile::from_bytes("a.bin", vec![1, 2, 3]);
    let result = outcome(&run_transfer(&executor(options), &file).await);

    assert_eq!(result.status, UploadStatus::Uploaded);
    assert_eq!(result.response_text, "stored");
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get_all("accept").iter().count(), 1);
}

#[tokio::test]
async fn test_path_payload_is_streamed_with_progress() {
    let mock_server = require_mock_server!();
    mount_ok(&mock_server).await;

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("large.dat");
    let content = vec![7_u8; 200 * 1024];
    std::fs::write(&path, &content).unwrap();

    let options = TransferOptions::builder(format!("{}/upload", mock_server.uri()))
        .build()
        .unwrap();
    let file = UploadFile::from_path(&path).await.unwrap();
    let events = run_transfer(&executor(options), &file).await;

    assert_eq!(outcome(&events).status, UploadStatus::Uploaded);
    let progress: Vec<(u8, u64)> = events
        .iter()
        .filter_map(|event| match event {
            TransferEvent::Progress {
                percent,
                sent_bytes,
            } => Some((*percent, *sent_bytes)),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|pair| pair[0].1 <= pair[1].1));
    assert_eq!(progress.last(), Some(&(100, content.len() as u64)));

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].body.len() > content.len());
    assert!(
        String::from_utf8_lossy(&requests[0].body).contains("filename=\"large.dat\"")
    );
}

// ==================== Outcome Tests ====================

#[tokio::test]
async fn test_non_200_status_fails_with_body_text() {
    let mock_server = require_mock_server!();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
        .mount(&mock_server)
        .await;

    let options = TransferOptions::builder(mock_server.uri()).build().unwrap();
    let file = UploadFile::from_bytes("a.bin", vec![1]);
    let result = outcome(&run_transfer(&executor(options), &file).await);

    assert_eq!(result.status, UploadStatus::Failed);
    assert_eq!(result.response_code, 403);
    assert_eq!(result.response_text, "quota exceeded");
}

#[tokio::test]
async fn test_empty_error_body_falls_back_to_status_text() {
    let mock_server = require_mock_server!();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let options = TransferOptions::builder(mock_server.uri()).build().unwrap();
    let file = UploadFile::from_bytes("a.bin", vec![1]);
    let result = outcome(&run_transfer(&executor(options), &file).await);

    // Only 200 counts as success.
    assert_eq!(result.status, UploadStatus::Failed);
    assert_eq!(result.response_code, 201);
    assert_eq!(result.response_text, "Created");
}

#[tokio::test]
async fn test_connection_refused_fails_without_status() {
    let listener = match std::net::TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(_) => return socket_skip_return(),
    };
    let address = listener.local_addr().unwrap();
    drop(listener);

    let options = TransferOptions::builder(format!("http://{address}/upload"))
        .build()
        .unwrap();
    let file = UploadFile::from_bytes("a.bin", vec![1]);
    let result = outcome(&run_transfer(&executor(options), &file).await);

    assert_eq!(result.status, UploadStatus::Failed);
    assert_eq!(result.response_code, 0);
    assert_eq!(result.response_text, "Invalid response from server");
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let mock_server = require_mock_server!();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&mock_server)
        .await;

    let options = TransferOptions::builder(mock_server.uri()).build().unwrap();
    let file = UploadFile::from_bytes("slow.bin", vec![0; 1024]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = executor(options).transfer(&file, Arc::new(tx));

    assert_eq!(rx.recv().await, Some(TransferEvent::Started));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.cancel());
    assert!(!handle.cancel(), "second cancel is a no-op");
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("canceled transfer did not stop");

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert_eq!(last, Some(TransferEvent::Finished(TransferOutcome::canceled())));
}

// ==================== Credential Tests ====================

#[tokio::test]
async fn test_cookies_only_sent_with_credentials() {
    let mock_server = require_mock_server!();
    mount_ok(&mock_server).await;
    let url = format!("{}/upload", mock_server.uri());

    let jar = Arc::new(Jar::default());
    jar.add_cookie_str("session=abc123", &url.parse().unwrap());
    let transport = Arc::new(HttpTransport::with_cookie_jar(Arc::clone(&jar)).unwrap());
    let file = UploadFile::from_bytes("a.bin", vec![1]);

    for with_credentials in [false, true] {
        let options = TransferOptions::builder(url.clone())
            .with_credentials(with_credentials)
            .build()
            .unwrap();
        let executor =
            TransferExecutor::new(options, Arc::clone(&transport) as _, Capabilities::detect());
        assert_eq!(
            outcome(&run_transfer(&executor, &file).await).status,
            UploadStatus::Uploaded
        );
    }

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("cookie").is_none());
    assert_eq!(
        requests[1].headers.get("cookie").unwrap().to_str().unwrap(),
        "session=abc123"
    );
}

#[tokio::test]
async fn test_missing_file_api_fails_without_request() {
    let mock_server = require_mock_server!();
    mount_ok(&mock_server).await;

    let executor = TransferExecutor::new(
        TransferOptions::builder(mock_server.uri()).build().unwrap(),
        Arc::new(HttpTransport::new().unwrap()),
        Capabilities::without_file_api(),
    );
    let file = UploadFile::from_bytes("a.bin", vec![1]);
    let result = outcome(&run_transfer(&executor, &file).await);

    assert_eq!(result.status, UploadStatus::Failed);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
